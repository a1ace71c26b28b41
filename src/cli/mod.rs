//! CLI argument parsing and command dispatch.

pub mod accounts;
pub mod acquire;
pub mod args;
pub mod providers;
pub mod sessions;

pub use args::{Cli, Commands, OutputFormat};
