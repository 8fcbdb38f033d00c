use serde::{Deserialize, Serialize};

use crate::value_objects::TargetRole;

/// 软件目录中的产品条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseCatalogEntry {
    pub product_id: i64,
    pub slug: String,
    pub releases_url: String,
}

/// 产品的一个发布版本
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    pub id: i64,
    pub version: String,
}

impl Release {
    pub fn new<S: Into<String>>(id: i64, version: S) -> Self {
        Self {
            id,
            version: version.into(),
        }
    }

    /// 版本比较键：删除所有 `.` 后按整数解析。
    ///
    /// 这不是语义化版本比较，"2.10" 的键是 210，而 "2.9" 的键是 29。
    /// 无法解析为整数的版本返回 `None`。
    pub fn version_key(&self) -> Option<u64> {
        let digits: String = self.version.chars().filter(|c| *c != '.').collect();
        digits.parse::<u64>().ok()
    }
}

/// 发布中的一个文件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductFile {
    pub name: String,
    /// 对象存储键，第三个路径段是规范文件名
    pub object_key: String,
    pub download_url: String,
}

impl ProductFile {
    pub fn canonical_name(&self) -> Option<&str> {
        self.object_key
            .split('/')
            .nth(2)
            .filter(|segment| !segment.is_empty())
    }
}

/// 发布中的文件分组
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileGroup {
    pub name: String,
    pub files: Vec<ProductFile>,
}

/// 分类器产出的制品描述，创建后不可变
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub url: String,
    pub name: String,
    pub target_role: TargetRole,
}

impl ArtifactDescriptor {
    pub fn new<U: Into<String>, N: Into<String>>(url: U, name: N, target_role: TargetRole) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            target_role,
        }
    }

    /// 该制品是否应该下发到给定角色的节点
    pub fn is_targeted_at(&self, node: &ClusterNode) -> bool {
        self.target_role.accepts(&node.role)
    }
}

/// 集群节点
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterNode {
    #[serde(rename = "nodeName")]
    pub node_name: String,
    #[serde(rename = "externalIP")]
    pub external_ip: String,
    pub role: String,
}

impl ClusterNode {
    pub fn new<N: Into<String>, I: Into<String>, R: Into<String>>(
        node_name: N,
        external_ip: I,
        role: R,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            external_ip: external_ip.into(),
            role: role.into(),
        }
    }

    /// 角色按子串匹配，节点角色字符串可能同时包含多个角色
    pub fn has_role(&self, role: &str) -> bool {
        self.role.contains(role)
    }
}

/// 集群描述，调用方在整个运行期间持有，核心只读
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterDescriptor {
    #[serde(rename = "clusterName")]
    pub cluster_name: String,
    #[serde(rename = "clusterType")]
    pub cluster_type: String,
    #[serde(rename = "clusterNodes", alias = "nodes")]
    pub nodes: Vec<ClusterNode>,
}

impl ClusterDescriptor {
    pub fn from_json(json: &str) -> crate::ProvisionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn nodes_with_role<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a ClusterNode> + 'a {
        self.nodes.iter().filter(move |node| node.has_role(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_key_strips_dots() {
        assert_eq!(Release::new(1, "4.3.8.1").version_key(), Some(4381));
        assert_eq!(Release::new(2, "10.0").version_key(), Some(100));
        assert_eq!(Release::new(3, "9.9").version_key(), Some(99));
        assert_eq!(Release::new(4, "5.0.0-beta").version_key(), None);
        assert_eq!(Release::new(5, "").version_key(), None);
    }

    #[test]
    fn test_version_key_is_not_semver() {
        // 2.10 在语义化版本中大于 2.9，这里同样更大，但差距被放大
        assert_eq!(Release::new(1, "2.10").version_key(), Some(210));
        assert_eq!(Release::new(2, "2.9").version_key(), Some(29));
        // 位数不同时排序与语义化版本相反: 4.3.17 (4317) > 5.0 (50)
        let older = Release::new(3, "4.3.17").version_key();
        let newer = Release::new(4, "5.0").version_key();
        assert!(older > newer);
    }

    #[test]
    fn test_canonical_name_is_third_segment() {
        let file = ProductFile {
            name: "Red Hat Enterprise Linux 5, 6".to_string(),
            object_key: "product-files/gpdb/greenplum-db-4.3.8.1-build-1-RHEL5-x86_64.zip"
                .to_string(),
            download_url: "https://example.invalid/download".to_string(),
        };
        assert_eq!(
            file.canonical_name(),
            Some("greenplum-db-4.3.8.1-build-1-RHEL5-x86_64.zip")
        );

        let short = ProductFile {
            object_key: "a/b".to_string(),
            ..file
        };
        assert_eq!(short.canonical_name(), None);
    }

    #[test]
    fn test_cluster_descriptor_from_json() {
        let json = r#"{
            "clusterName": "demo",
            "clusterType": "pivotal-gpdb",
            "clusterNodes": [
                {"nodeName": "demo-mdw", "externalIP": "10.0.0.2", "role": "master"},
                {"nodeName": "demo-sdw1", "externalIP": "10.0.0.3", "role": "worker"}
            ]
        }"#;

        let cluster = ClusterDescriptor::from_json(json).unwrap();
        assert_eq!(cluster.cluster_name, "demo");
        assert_eq!(cluster.nodes.len(), 2);
        assert_eq!(cluster.nodes[0].external_ip, "10.0.0.2");
        assert_eq!(cluster.nodes_with_role("worker").count(), 1);
    }

    #[test]
    fn test_node_role_is_substring_match() {
        let node = ClusterNode::new("n1", "10.0.0.1", "master,access");
        assert!(node.has_role("master"));
        assert!(node.has_role("access"));
        assert!(!node.has_role("worker"));
    }
}
