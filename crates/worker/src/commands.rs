//! 远程命令的构造与批量执行

use async_trait::async_trait;
use provisioner_domain::{
    ArtifactDescriptor, ClusterNode, CommandOutput, ProvisionError, ProvisionResult,
    RemoteSession,
};
use tracing::{info, warn};

use crate::session_manager::SessionWork;

/// 一条远程命令。`label` 用于日志和错误信息，命令本身可能含有令牌
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub label: String,
    pub command: String,
}

impl RemoteCommand {
    pub fn new<L: Into<String>, C: Into<String>>(label: L, command: C) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
        }
    }

    /// 不含敏感信息的命令，直接用命令文本作标签
    pub fn plain<C: Into<String>>(command: C) -> Self {
        let command = command.into();
        Self {
            label: command.clone(),
            command,
        }
    }
}

/// POSIX shell 单引号转义
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub fn staging_path(staging_dir: &str, name: &str) -> String {
    format!("{}/{}", staging_dir.trim_end_matches('/'), name)
}

/// 在节点上下载制品到暂存目录的 wget 命令
pub fn fetch_command(artifact: &ArtifactDescriptor, api_key: &str, staging_dir: &str) -> RemoteCommand {
    let header = format!("Authorization: Token {api_key}");
    let command = format!(
        "wget --header={} --post-data='' {} -O {}",
        shell_quote(&header),
        shell_quote(&artifact.url),
        shell_quote(&staging_path(staging_dir, &artifact.name)),
    );
    RemoteCommand::new(format!("fetch {}", artifact.name), command)
}

/// 在同一会话中按顺序执行的一组命令
#[derive(Debug, Clone)]
pub struct CommandBatch {
    commands: Vec<RemoteCommand>,
    fail_on_command_error: bool,
}

impl CommandBatch {
    pub fn new(commands: Vec<RemoteCommand>, fail_on_command_error: bool) -> Self {
        Self {
            commands,
            fail_on_command_error,
        }
    }

    pub fn commands(&self) -> &[RemoteCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[async_trait]
impl SessionWork for CommandBatch {
    type Output = Vec<CommandOutput>;

    async fn run(
        &self,
        node: &ClusterNode,
        session: &mut dyn RemoteSession,
    ) -> ProvisionResult<Self::Output> {
        let mut outputs = Vec::with_capacity(self.commands.len());

        for command in &self.commands {
            info!("{}: 执行 {}", node.node_name, command.label);
            let output = session.exec(&command.command).await?;

            if !output.is_success() {
                if self.fail_on_command_error {
                    return Err(ProvisionError::CommandFailure {
                        node: node.node_name.clone(),
                        command: command.label.clone(),
                        exit_code: output.exit_code,
                        stderr: output.stderr.trim().to_string(),
                    });
                }
                warn!(
                    "{}: {} 退出码 {:?}，继续执行: {}",
                    node.node_name,
                    command.label,
                    output.exit_code,
                    output.stderr.trim()
                );
            }

            outputs.push(output);
        }

        Ok(outputs)
    }
}
