#![cfg(feature = "test-utils")]

mod deploy_test;
mod remove_test;
