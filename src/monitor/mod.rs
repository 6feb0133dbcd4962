pub mod monitor_model;
pub mod monitor_service;
pub mod run_lock;

pub use monitor_model::{AccountOutcome, MonitorRunSummary};
pub use monitor_service::MonitorService;
pub use run_lock::{RunLockRepository, RunLockRepositoryTrait};
