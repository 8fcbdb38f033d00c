//! # Provisioner Testing Utils
//!
//! 工作区共享的测试工具：目录与远程会话的内存实现、测试数据构建器。
//!
//! ```toml
//! [dev-dependencies]
//! provisioner-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
