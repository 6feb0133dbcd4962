pub mod validation_model;
pub mod validation_service;


pub use validation_model::{Discrepancy, ValidationReport};
pub use validation_service::ValidationService;
