//! Telemetry setup shared by the dynarep binaries and tests.

pub mod tracing;
