use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use provisioner::{load_cluster, Application};
use provisioner_config::{AppConfig, LogFormat};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cluster_arg() -> Arg {
    Arg::new("cluster")
        .long("cluster")
        .value_name("FILE")
        .help("集群描述 JSON 文件")
        .value_parser(clap::value_parser!(PathBuf))
        .required(true)
}

fn build_cli() -> Command {
    Command::new("provisioner")
        .version(env!("CARGO_PKG_VERSION"))
        .about("集群制品解析与分发工具")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(
            Command::new("resolve")
                .about("解析产品的最新发布")
                .arg(
                    Arg::new("product")
                        .long("product")
                        .value_name("SLUG")
                        .help("产品 slug 子串")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("classify")
                .about("列出集群需要的制品及目标角色")
                .arg(cluster_arg()),
        )
        .subcommand(
            Command::new("distribute")
                .about("把制品分发到集群所有节点")
                .arg(cluster_arg()),
        )
        .subcommand(
            Command::new("exec")
                .about("在角色匹配的节点上执行命令")
                .arg(cluster_arg())
                .arg(
                    Arg::new("role")
                        .long("role")
                        .value_name("ROLE")
                        .help("节点角色子串")
                        .required(true),
                )
                .arg(
                    Arg::new("cmd")
                        .long("cmd")
                        .value_name("COMMAND")
                        .help("要执行的命令，可重复，按顺序执行")
                        .action(ArgAction::Append)
                        .required(true),
                ),
        )
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = match AppConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("加载配置失败: {e:#}");
            std::process::exit(2);
        }
    };

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = match format.as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
    }

    if let Err(e) = init_logging(&config) {
        eprintln!("{e:#}");
        std::process::exit(2);
    }

    // 任何节点失败都视为整个运行失败
    if let Err(e) = run(config, &matches).await {
        error!("运行失败: {e:#}");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig, matches: &ArgMatches) -> Result<()> {
    let app = Application::new(config)?;

    match matches.subcommand() {
        Some(("resolve", sub)) => {
            let product = required(sub, "product")?;
            let (entry, release) = app.resolve(product).await?;
            print_json(&serde_json::json!({ "product": entry, "release": release }))?;
        }
        Some(("classify", sub)) => {
            let cluster = load_cluster(required_path(sub)?)?;
            let artifacts = app.classify(&cluster).await?;
            print_json(&artifacts)?;
        }
        Some(("distribute", sub)) => {
            let cluster = load_cluster(required_path(sub)?)?;
            let report = app.distribute(&cluster).await?;
            info!(
                "{} {} 已分发到 {} 个节点",
                report.product.slug,
                report.release.version,
                report.deliveries.len()
            );
            print_json(&report)?;
        }
        Some(("exec", sub)) => {
            let cluster = load_cluster(required_path(sub)?)?;
            let role = required(sub, "role")?;
            let commands: Vec<String> = sub
                .get_many::<String>("cmd")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            let completed = app.exec(&cluster, role, commands).await?;
            info!("{} 个节点执行完成", completed);
        }
        _ => anyhow::bail!("未知的子命令"),
    }

    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("缺少参数 --{name}"))
}

fn required_path(matches: &ArgMatches) -> Result<&PathBuf> {
    matches
        .get_one::<PathBuf>("cluster")
        .context("缺少参数 --cluster")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value).context("序列化输出失败")?;
    println!("{output}");
    Ok(())
}

/// 初始化日志系统，RUST_LOG 优先于配置。日志写到 stderr，stdout 只输出结果
fn init_logging(config: &AppConfig) -> Result<()> {
    let log_level = config.observability.log_level.as_str();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.observability.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .context("初始化JSON日志格式失败")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()
            .context("初始化Pretty日志格式失败")?,
    }

    Ok(())
}
