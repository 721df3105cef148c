//! tests/mod.rs
mod support;

mod model_tests;
mod operation_tests;
mod report_tests;
