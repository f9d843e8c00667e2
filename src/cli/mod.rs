//! CLI argument parsing and command dispatch.

pub mod args;
pub mod estimate;
pub mod predict;
pub mod serve;
pub mod status;

pub use args::{Cli, Commands, OutputFormat};
