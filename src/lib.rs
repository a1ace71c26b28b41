//! cdkfetch - collect daily reward codes (CDKs) from reward platforms.
//!
//! Each configured account is run against each selected provider: a session
//! is established (cookie jar, bearer token, or a delegated browser login),
//! the provider's reward action is repeated until the daily allowance is
//! used up, and every code obtained is reported.

#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod core;
pub mod error;
pub mod providers;
pub mod render;
pub mod storage;

/// Test utilities module - included in test builds or when test-utils feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{CdkError, ExitCode, Result};

// Re-export test utilities for external test crates
#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::*;
