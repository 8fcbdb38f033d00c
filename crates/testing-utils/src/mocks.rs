//! 内存中的目录客户端与远程连接器

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use provisioner_domain::{
    CatalogClient, ClusterNode, CommandOutput, FileGroup, ProvisionError, ProvisionResult,
    Release, ReleaseCatalogEntry, RemoteConnector, RemoteSession,
};

/// Mock implementation of CatalogClient
#[derive(Debug, Default)]
pub struct MockCatalogClient {
    products: Vec<ReleaseCatalogEntry>,
    releases: HashMap<String, Vec<Release>>,
    files: HashMap<(String, i64), Vec<FileGroup>>,
    unavailable: bool,
    eula_acceptances: Mutex<Vec<(String, i64)>>,
    release_requests: Mutex<Vec<String>>,
}

impl MockCatalogClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有请求都返回 `CatalogUnavailable`
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_product(mut self, slug: &str, releases: Vec<Release>) -> Self {
        let product_id = self.products.len() as i64 + 1;
        self.products.push(ReleaseCatalogEntry {
            product_id,
            slug: slug.to_string(),
            releases_url: format!("https://catalog.test/api/v2/products/{product_id}/releases"),
        });
        self.releases.insert(slug.to_string(), releases);
        self
    }

    pub fn with_release_files(mut self, slug: &str, release_id: i64, groups: Vec<FileGroup>) -> Self {
        self.files.insert((slug.to_string(), release_id), groups);
        self
    }

    pub fn eula_acceptances(&self) -> Vec<(String, i64)> {
        self.eula_acceptances.lock().unwrap().clone()
    }

    /// 被请求过发布列表的产品 slug
    pub fn release_requests(&self) -> Vec<String> {
        self.release_requests.lock().unwrap().clone()
    }

    fn check_available(&self) -> ProvisionResult<()> {
        if self.unavailable {
            return Err(ProvisionError::catalog_unavailable("mock catalog unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogClient for MockCatalogClient {
    async fn list_products(&self) -> ProvisionResult<Vec<ReleaseCatalogEntry>> {
        self.check_available()?;
        Ok(self.products.clone())
    }

    async fn list_releases(&self, product: &ReleaseCatalogEntry) -> ProvisionResult<Vec<Release>> {
        self.check_available()?;
        self.release_requests
            .lock()
            .unwrap()
            .push(product.slug.clone());
        Ok(self.releases.get(&product.slug).cloned().unwrap_or_default())
    }

    async fn release_files(
        &self,
        product: &ReleaseCatalogEntry,
        release: &Release,
    ) -> ProvisionResult<Vec<FileGroup>> {
        self.check_available()?;
        Ok(self
            .files
            .get(&(product.slug.clone(), release.id))
            .cloned()
            .unwrap_or_default())
    }

    async fn accept_eula(&self, product: &ReleaseCatalogEntry, release: &Release) -> ProvisionResult<()> {
        self.check_available()?;
        self.eula_acceptances
            .lock()
            .unwrap()
            .push((product.slug.clone(), release.id));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ConnectorState {
    /// 节点名 -> 剩余的连接失败次数
    connect_failures: HashMap<String, u32>,
    /// 节点名 -> 剩余的命令传输失败次数
    exec_failures: HashMap<String, u32>,
    /// (命令子串, 退出码)
    exit_codes: Vec<(String, i32)>,
    /// 连接时让任务 panic 的节点
    panic_nodes: HashSet<String>,
    attempts: HashMap<String, u32>,
    commands: HashMap<String, Vec<String>>,
    sessions_opened: usize,
    open_sessions: usize,
}

/// Mock implementation of RemoteConnector
///
/// 可以按节点编排连接失败、命令传输失败和退出码，并记录每个节点的连接次数、
/// 执行过的命令和未关闭的会话数。
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 前 `times` 次连接失败
    pub fn fail_connect(self, node_name: &str, times: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .connect_failures
            .insert(node_name.to_string(), times);
        self
    }

    pub fn always_fail(self, node_name: &str) -> Self {
        self.fail_connect(node_name, u32::MAX)
    }

    /// 连接该节点时 panic，模拟节点任务异常退出
    pub fn panic_on_connect(self, node_name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .panic_nodes
            .insert(node_name.to_string());
        self
    }

    /// 前 `times` 次命令执行出现传输错误
    pub fn fail_exec(self, node_name: &str, times: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .exec_failures
            .insert(node_name.to_string(), times);
        self
    }

    /// 包含 `pattern` 的命令返回给定退出码
    pub fn with_exit_code(self, pattern: &str, exit_code: i32) -> Self {
        self.state
            .lock()
            .unwrap()
            .exit_codes
            .push((pattern.to_string(), exit_code));
        self
    }

    pub fn attempts(&self, node_name: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .attempts
            .get(node_name)
            .copied()
            .unwrap_or(0)
    }

    pub fn commands(&self, node_name: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .commands
            .get(node_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.lock().unwrap().sessions_opened
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().open_sessions
    }
}

#[async_trait]
impl RemoteConnector for MockConnector {
    async fn connect(&self, node: &ClusterNode) -> ProvisionResult<Box<dyn RemoteSession>> {
        // 先释放锁再 panic，避免毒化共享状态
        let should_panic = self.state.lock().unwrap().panic_nodes.contains(&node.node_name);
        if should_panic {
            panic!("mock connector panicked on {}", node.node_name);
        }

        let mut state = self.state.lock().unwrap();
        *state.attempts.entry(node.node_name.clone()).or_insert(0) += 1;

        if let Some(remaining) = state.connect_failures.get_mut(&node.node_name) {
            if *remaining > 0 {
                *remaining = remaining.saturating_sub(1);
                return Err(ProvisionError::session(format!(
                    "connection refused: {}",
                    node.external_ip
                )));
            }
        }

        state.sessions_opened += 1;
        state.open_sessions += 1;

        Ok(Box::new(MockSession {
            node_name: node.node_name.clone(),
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

/// 不实现 Drop：只有显式 close 才计为关闭，便于发现泄漏的会话
#[derive(Debug)]
pub struct MockSession {
    node_name: String,
    state: Arc<Mutex<ConnectorState>>,
    closed: bool,
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn exec(&mut self, command: &str) -> ProvisionResult<CommandOutput> {
        let mut state = self.state.lock().unwrap();
        state
            .commands
            .entry(self.node_name.clone())
            .or_default()
            .push(command.to_string());

        if let Some(remaining) = state.exec_failures.get_mut(&self.node_name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProvisionError::session("channel closed unexpectedly"));
            }
        }

        let exit_code = state
            .exit_codes
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, code)| *code);

        Ok(match exit_code {
            Some(code) if code != 0 => CommandOutput::failed(code, "mock failure"),
            _ => CommandOutput {
                exit_code: Some(0),
                stdout: format!("ok: {command}"),
                stderr: String::new(),
            },
        })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.state.lock().unwrap().open_sessions -= 1;
    }
}
