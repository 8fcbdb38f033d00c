use provisioner_config::AppConfig;
use provisioner_domain::{ArtifactDescriptor, FileGroup, RuleSet};
use tracing::{debug, warn};

/// 按集群类型的规则表把发布文件映射为带目标角色的制品
#[derive(Debug, Clone)]
pub struct ArtifactClassifier {
    rule_sets: Vec<RuleSet>,
    version_token: Option<String>,
}

impl ArtifactClassifier {
    pub fn new(rule_sets: Vec<RuleSet>, version_token: Option<String>) -> Self {
        Self {
            rule_sets,
            version_token,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.selection.rule_sets.clone(),
            config.distribution.version_token.clone(),
        )
    }

    pub fn rule_set_for(&self, cluster_type: &str) -> Option<&RuleSet> {
        self.rule_sets.iter().find(|set| set.applies_to(cluster_type))
    }

    pub fn classify(&self, cluster_type: &str, groups: &[FileGroup]) -> Vec<ArtifactDescriptor> {
        match self.rule_set_for(cluster_type) {
            Some(rule_set) => classify(rule_set, groups, self.version_token.as_deref()),
            None => {
                warn!("集群类型 {} 没有对应的选择规则", cluster_type);
                Vec::new()
            }
        }
    }
}

/// 每个文件由第一条匹配的规则认领，未匹配的分组和文件直接跳过。
/// 输出顺序即匹配顺序。
pub fn classify(
    rule_set: &RuleSet,
    groups: &[FileGroup],
    version_token: Option<&str>,
) -> Vec<ArtifactDescriptor> {
    let mut artifacts = Vec::new();

    for group in groups {
        for file in &group.files {
            let Some(rule) = rule_set.first_match(&group.name, &file.name, version_token) else {
                continue;
            };

            let Some(name) = file.canonical_name() else {
                warn!("文件 {} 的对象键 {} 缺少文件名段，跳过", file.name, file.object_key);
                continue;
            };

            debug!("{} / {} -> {} ({})", group.name, file.name, name, rule.target);
            artifacts.push(ArtifactDescriptor::new(
                file.download_url.clone(),
                name,
                rule.target,
            ));
        }
    }

    artifacts
}
