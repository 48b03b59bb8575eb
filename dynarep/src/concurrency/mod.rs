//! Coordination primitives for concurrent regional work.
//!
//! The [`shutdown`] module broadcasts a single shutdown request to every task waiting on a
//! remote status, so that a Ctrl+C or an external timeout aborts all waits at their next sleep
//! point.

pub mod shutdown;
