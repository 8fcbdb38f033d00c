use serde::{Deserialize, Serialize};

/// 制品的目标节点角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetRole {
    /// 所有节点
    ClusterWide,
    Access,
    Master,
    Worker,
}

impl TargetRole {
    /// 对应的节点角色子串，`ClusterWide` 没有
    pub fn role_tag(&self) -> Option<&'static str> {
        match self {
            TargetRole::ClusterWide => None,
            TargetRole::Access => Some("access"),
            TargetRole::Master => Some("master"),
            TargetRole::Worker => Some("worker"),
        }
    }

    /// 节点角色字符串是否接收此目标角色的制品
    pub fn accepts(&self, node_role: &str) -> bool {
        match self.role_tag() {
            None => true,
            Some(tag) => node_role.contains(tag),
        }
    }
}

impl std::fmt::Display for TargetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetRole::ClusterWide => "clusterwide",
            TargetRole::Access => "access",
            TargetRole::Master => "master",
            TargetRole::Worker => "worker",
        };
        write!(f, "{s}")
    }
}

/// 单条选择规则：(分组名子串, 文件名子串) -> 目标角色
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionRule {
    pub group: String,
    /// 为空时匹配分组内的所有文件
    #[serde(default)]
    pub file: Option<String>,
    /// 文件名还必须包含外部提供的版本标记
    #[serde(default)]
    pub requires_version_token: bool,
    pub target: TargetRole,
}

impl SelectionRule {
    pub fn new<G: Into<String>>(group: G, file: Option<&str>, target: TargetRole) -> Self {
        Self {
            group: group.into(),
            file: file.map(str::to_string),
            requires_version_token: false,
            target,
        }
    }

    pub fn with_version_token(mut self) -> Self {
        self.requires_version_token = true;
        self
    }

    pub fn matches(&self, group_name: &str, file_name: &str, version_token: Option<&str>) -> bool {
        if !group_name.contains(&self.group) {
            return false;
        }
        if let Some(ref file) = self.file {
            if !file_name.contains(file.as_str()) {
                return false;
            }
        }
        if self.requires_version_token {
            return version_token.is_some_and(|token| file_name.contains(token));
        }
        true
    }
}

/// 一种集群类型的规则表
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleSet {
    /// 集群类型子串
    pub cluster_type: String,
    pub rules: Vec<SelectionRule>,
}

impl RuleSet {
    pub fn applies_to(&self, cluster_type: &str) -> bool {
        cluster_type.contains(&self.cluster_type)
    }

    /// 第一条匹配的规则胜出
    pub fn first_match(
        &self,
        group_name: &str,
        file_name: &str,
        version_token: Option<&str>,
    ) -> Option<&SelectionRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(group_name, file_name, version_token))
    }
}

/// 内置规则表
pub fn builtin_rule_sets() -> Vec<RuleSet> {
    vec![
        RuleSet {
            cluster_type: "pivotal-gpdb".to_string(),
            rules: vec![
                SelectionRule::new(
                    "Database Server",
                    Some("Red Hat Enterprise Linux 5, 6"),
                    TargetRole::ClusterWide,
                ),
                SelectionRule::new(
                    "Loader",
                    Some("Red Hat Enterprise Linux x86_64"),
                    TargetRole::ClusterWide,
                ),
                SelectionRule::new("Analytics", None, TargetRole::Master).with_version_token(),
                SelectionRule::new(
                    "Language extensions",
                    Some("PL/R Extension for RHEL"),
                    TargetRole::Master,
                ),
                SelectionRule::new(
                    "Clients",
                    Some("Clients for Red Hat Enterprise Linux x86_64"),
                    TargetRole::Access,
                ),
            ],
        },
        // HDB 的所有制品只下发到 access 节点
        RuleSet {
            cluster_type: "pivotal-hdb".to_string(),
            rules: vec![
                SelectionRule::new("Software", Some("RHEL"), TargetRole::Access),
                SelectionRule::new("Language", None, TargetRole::Access),
                SelectionRule::new("MADlib", None, TargetRole::Access).with_version_token(),
            ],
        },
    ]
}
