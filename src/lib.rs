pub mod db;

pub mod accounts;
pub mod adjustment;
pub mod benchmark;
pub mod ingestion;
pub mod ledger;
pub mod market_data;
pub mod monitor;
pub mod navs;
pub mod rebalancing;
pub mod validation;

pub mod constants;
pub mod context;
pub mod errors;
pub mod schema;
pub mod utils;

pub use context::{EngineConfig, ServiceContext};
pub use errors::{Error, Result};
