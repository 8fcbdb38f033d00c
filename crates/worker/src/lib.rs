pub mod commands;
pub mod node_worker;
pub mod retry;
pub mod session_manager;

pub use commands::{fetch_command, shell_quote, staging_path, CommandBatch, RemoteCommand};
pub use node_worker::{NodeDelivery, NodeWorker, WorkerSettings};
pub use retry::RetryBudget;
pub use session_manager::{SessionManager, SessionWork};
