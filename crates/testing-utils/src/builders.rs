//! Test data builders

use provisioner_domain::{ClusterDescriptor, ClusterNode, FileGroup, ProductFile};

/// Builder for creating test ClusterDescriptor values
pub struct ClusterBuilder {
    cluster: ClusterDescriptor,
}

impl ClusterBuilder {
    pub fn new(cluster_type: &str) -> Self {
        Self {
            cluster: ClusterDescriptor {
                cluster_name: "test-cluster".to_string(),
                cluster_type: cluster_type.to_string(),
                nodes: Vec::new(),
            },
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.cluster.cluster_name = name.to_string();
        self
    }

    /// 外部 IP 按节点序号生成
    pub fn with_node(mut self, node_name: &str, role: &str) -> Self {
        let ip = format!("10.0.0.{}", self.cluster.nodes.len() + 1);
        self.cluster
            .nodes
            .push(ClusterNode::new(node_name, ip, role));
        self
    }

    pub fn build(self) -> ClusterDescriptor {
        self.cluster
    }
}

/// 常用的三节点集群：master、access、worker 各一个
pub fn three_node_cluster(cluster_type: &str) -> ClusterDescriptor {
    ClusterBuilder::new(cluster_type)
        .with_node("mdw", "master")
        .with_node("access1", "access")
        .with_node("sdw1", "worker")
        .build()
}

/// Builder for creating test FileGroup values
pub struct FileGroupBuilder {
    group: FileGroup,
}

impl FileGroupBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            group: FileGroup {
                name: name.to_string(),
                files: Vec::new(),
            },
        }
    }

    /// 下载地址由对象键推导
    pub fn with_file(mut self, name: &str, object_key: &str) -> Self {
        let download_url = format!("https://catalog.test/download/{object_key}");
        self.group.files.push(ProductFile {
            name: name.to_string(),
            object_key: object_key.to_string(),
            download_url,
        });
        self
    }

    pub fn build(self) -> FileGroup {
        self.group
    }
}
