//! Distribution Composition Root
//!
//! 版本解析 -> 制品分类 -> 按节点并发分发。

pub mod classifier;
pub mod resolver;
pub mod scheduler;
pub mod service;

pub use classifier::ArtifactClassifier;
pub use resolver::VersionResolver;
pub use scheduler::DistributionScheduler;
pub use service::{DistributionReport, DistributionService};
pub use provisioner_worker::NodeDelivery;
