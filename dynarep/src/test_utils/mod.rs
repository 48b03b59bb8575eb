//! Test support: an in-memory provider, scripted status queries and table fixtures.
//!
//! [`memory_provider::MemoryProvider`] simulates tables, global tables and stacks across
//! regions, including status transitions that have to be polled, so deploy and remove runs can
//! be exercised without AWS.

pub mod fixtures;
pub mod memory_provider;
pub mod status;
