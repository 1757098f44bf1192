//! CLI integration tests for hostform.

mod apply_tests;
mod check_tests;
mod common;
