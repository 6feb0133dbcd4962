pub mod basket_math;
#[cfg(test)]
pub(crate) mod store_mock;
pub mod benchmark_errors;
pub mod benchmark_model;
pub mod benchmark_repository;
pub mod benchmark_service;
pub mod benchmark_traits;

pub use basket_math::{BasketUnits, CashflowOutcome, Weights};
pub use benchmark_errors::BenchmarkError;
pub use benchmark_model::BenchmarkState;
pub use benchmark_repository::BenchmarkRepository;
pub use benchmark_service::BenchmarkService;
pub use benchmark_traits::BenchmarkStoreTrait;
