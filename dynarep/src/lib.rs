//! Replication of CloudFormation-managed DynamoDB tables across regions.
//!
//! The crate discovers the tables of a deployed stack, works out which target regions still
//! lack a replica ([`resolver::RegionDiffResolver`]) and links them using either version of the
//! DynamoDB global tables feature. Optional regional stack deployments are awaited with
//! [`poll::stack::StackStatusPoller`].
//!
//! Provider access goes through the [`provider::TableProvider`] and [`provider::StackProvider`]
//! traits. [`provider::aws::AwsProvider`] implements both on top of the AWS SDK.

#[macro_use]
mod macros;

pub mod concurrency;
pub mod deployer;
pub mod error;
pub mod poll;
pub mod provider;
pub mod resolver;
pub mod schema;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
