pub mod spot_provider;

pub use spot_provider::SpotPriceProvider;
