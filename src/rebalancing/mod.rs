pub mod rebalancing_service;
pub mod schedule;

#[cfg(test)]
mod rebalancing_service_tests;

pub use rebalancing_service::RebalancingService;
