pub mod nav_model;
pub mod nav_repository;
pub mod nav_service;
pub mod nav_traits;

pub use nav_model::NavSnapshot;
pub use nav_repository::NavRepository;
pub use nav_service::NavService;
pub use nav_traits::{NavRepositoryTrait, NavSource};
