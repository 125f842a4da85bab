#![warn(unused_crate_dependencies)]

pub mod cli;
mod commands;
pub mod tracing;

pub use commands::{create_runtime, run};
