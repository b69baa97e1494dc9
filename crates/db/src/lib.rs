pub mod codec;
pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{MarketSeedDataset, OrderSeedInfo, SeedResult, VerificationResult};
pub use repositories::RepositoryError;
