//! 基于 libssh2 的远程会话
//!
//! libssh2 的调用都是阻塞的，因此连接和命令执行都放在 `spawn_blocking` 中运行。
//! 新建集群节点的主机密钥通常是未知的，这里按首次信任处理：未知密钥只告警，
//! 只有在配置了 known_hosts 且密钥不匹配时才拒绝连接。

use std::io::Read;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use provisioner_config::SshConfig;
use provisioner_domain::{
    ClusterNode, CommandOutput, ProvisionError, ProvisionResult, RemoteConnector, RemoteSession,
};
use ssh2::{CheckResult, KnownHostFileKind, Session};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct SshSettings {
    username: String,
    key_path: PathBuf,
    port: u16,
    connect_timeout: Duration,
    known_hosts_path: Option<PathBuf>,
}

/// 为每个节点建立 SSH 会话
#[derive(Debug, Clone)]
pub struct SshConnector {
    settings: Arc<SshSettings>,
}

impl SshConnector {
    pub fn new(config: &SshConfig) -> Self {
        Self {
            settings: Arc::new(SshSettings {
                username: config.username.clone(),
                key_path: config.key_path(),
                port: config.port,
                connect_timeout: Duration::from_secs(config.connect_timeout_seconds),
                known_hosts_path: config.known_hosts_path.as_ref().map(PathBuf::from),
            }),
        }
    }
}

#[async_trait]
impl RemoteConnector for SshConnector {
    async fn connect(&self, node: &ClusterNode) -> ProvisionResult<Box<dyn RemoteSession>> {
        let settings = Arc::clone(&self.settings);
        let node = node.clone();

        let session = tokio::task::spawn_blocking(move || connect_blocking(&settings, &node))
            .await
            .map_err(|e| ProvisionError::Internal(format!("SSH连接任务异常: {e}")))??;

        Ok(Box::new(session))
    }
}

fn resolve_addr(host: &str, port: u16) -> ProvisionResult<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| ProvisionError::session(format!("无法解析地址 {host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| ProvisionError::session(format!("地址 {host}:{port} 没有可用的解析结果")))
}

fn connect_blocking(settings: &SshSettings, node: &ClusterNode) -> ProvisionResult<SshSession> {
    let addr = resolve_addr(&node.external_ip, settings.port)?;
    let tcp = TcpStream::connect_timeout(&addr, settings.connect_timeout)
        .map_err(|e| ProvisionError::session(format!("TCP连接 {addr} 失败: {e}")))?;

    let mut session =
        Session::new().map_err(|e| ProvisionError::session(format!("创建SSH会话失败: {e}")))?;
    session.set_tcp_stream(tcp);
    // 超时只约束握手和认证，下载命令可能长时间没有输出
    session.set_timeout(settings.connect_timeout.as_millis().min(u32::MAX as u128) as u32);

    session
        .handshake()
        .map_err(|e| ProvisionError::session(format!("SSH握手失败 {addr}: {e}")))?;

    verify_host_key(&session, settings, node)?;

    session
        .userauth_pubkey_file(&settings.username, None, &settings.key_path, None)
        .map_err(|e| ProvisionError::session(format!("密钥认证失败 {}: {e}", settings.username)))?;

    if !session.authenticated() {
        return Err(ProvisionError::session("SSH认证未通过"));
    }

    session.set_timeout(0);
    debug!("{}: SSH会话已建立 ({})", node.node_name, addr);

    Ok(SshSession {
        node_name: node.node_name.clone(),
        session: Arc::new(Mutex::new(session)),
        closed: false,
    })
}

fn verify_host_key(
    session: &Session,
    settings: &SshSettings,
    node: &ClusterNode,
) -> ProvisionResult<()> {
    let (key, _key_type) = session
        .host_key()
        .ok_or_else(|| ProvisionError::session("服务器未提供主机密钥"))?;

    let Some(ref known_hosts_path) = settings.known_hosts_path else {
        warn!("{}: 未知的主机密钥 {}，已接受", node.node_name, node.external_ip);
        return Ok(());
    };

    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| ProvisionError::session(format!("初始化known_hosts失败: {e}")))?;
    if let Err(e) = known_hosts.read_file(Path::new(known_hosts_path), KnownHostFileKind::OpenSSH) {
        warn!("读取known_hosts {} 失败: {}", known_hosts_path.display(), e);
    }

    match known_hosts.check_port(&node.external_ip, settings.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::Mismatch => Err(ProvisionError::session(format!(
            "{} 的主机密钥与known_hosts不匹配",
            node.external_ip
        ))),
        CheckResult::NotFound | CheckResult::Failure => {
            warn!("{}: 未知的主机密钥 {}，已接受", node.node_name, node.external_ip);
            Ok(())
        }
    }
}

/// 一个节点上打开的 SSH 会话
pub struct SshSession {
    node_name: String,
    session: Arc<Mutex<Session>>,
    closed: bool,
}

fn exec_blocking(session: &Mutex<Session>, command: &str) -> ProvisionResult<CommandOutput> {
    let session = session
        .lock()
        .map_err(|_| ProvisionError::Internal("SSH会话锁已损坏".to_string()))?;

    let mut channel = session
        .channel_session()
        .map_err(|e| ProvisionError::session(format!("打开通道失败: {e}")))?;
    channel
        .exec(command)
        .map_err(|e| ProvisionError::session(format!("执行命令失败: {e}")))?;

    let mut stdout = Vec::new();
    channel
        .read_to_end(&mut stdout)
        .map_err(|e| ProvisionError::session(format!("读取stdout失败: {e}")))?;
    let mut stderr = Vec::new();
    channel
        .stderr()
        .read_to_end(&mut stderr)
        .map_err(|e| ProvisionError::session(format!("读取stderr失败: {e}")))?;

    channel
        .wait_close()
        .map_err(|e| ProvisionError::session(format!("关闭通道失败: {e}")))?;

    Ok(CommandOutput {
        exit_code: channel.exit_status().ok(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn exec(&mut self, command: &str) -> ProvisionResult<CommandOutput> {
        if self.closed {
            return Err(ProvisionError::session(format!("{}: 会话已关闭", self.node_name)));
        }

        let session = Arc::clone(&self.session);
        let command = command.to_string();

        tokio::task::spawn_blocking(move || exec_blocking(&session, &command))
            .await
            .map_err(|e| ProvisionError::Internal(format!("命令执行任务异常: {e}")))?
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match self.session.lock() {
            Ok(session) => {
                if let Err(e) = session.disconnect(None, "provisioning finished", None) {
                    debug!("{}: 断开SSH会话出错: {}", self.node_name, e);
                }
            }
            Err(_) => warn!("{}: SSH会话锁已损坏，跳过断开", self.node_name),
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}
