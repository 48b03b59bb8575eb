//! Shared configuration types for the deployer.

mod base;
mod deployer;
mod global_tables;
mod polling;
mod provider;

pub use base::ValidationError;
pub use deployer::DeployerConfig;
pub use global_tables::{GlobalTablesConfig, ReplicationVersion};
pub use polling::PollingConfig;
pub use provider::ProviderConfig;
