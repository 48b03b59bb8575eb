//! Access to the cloud provider.
//!
//! [`TableProvider`] covers DynamoDB tables, global tables and their auto scaling settings,
//! [`StackProvider`] covers CloudFormation stacks. Every method is scoped to one region.

pub mod aws;
mod base;

pub use base::{StackProvider, TableProvider};
