//! Shared helpers for integration tests.
//!
//! - `logger`: structured test logging
//! - [`Sandbox`]: a temp directory with its own accounts and config files,
//!   and a command builder that never touches the real user directories
#![allow(dead_code)]

pub mod logger;

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Isolated home for one binary invocation.
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn accounts_path(&self) -> PathBuf {
        self.path().join("accounts.json")
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.path().join("config.toml")
    }

    /// Write the accounts file.
    pub fn write_accounts(&self, json: &str) {
        std::fs::write(self.accounts_path(), json).expect("write accounts");
    }

    /// Write the TOML config file.
    pub fn write_config(&self, toml: &str) {
        std::fs::write(self.config_path(), toml).expect("write config");
    }

    /// `cdkfetch` with every path and knob pointed into the sandbox.
    #[must_use]
    #[allow(deprecated)]
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("cdkfetch").expect("binary built");
        cmd.env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("XDG_DATA_HOME", self.path().join("data"))
            .env("CDKFETCH_CONFIG", self.config_path())
            .env("CDKFETCH_ACCOUNTS", self.accounts_path())
            .env("NO_COLOR", "1")
            .env_remove("CDKFETCH_PROVIDERS")
            .env_remove("CDKFETCH_FORMAT")
            .env_remove("CDKFETCH_PROXY")
            .env_remove("CDKFETCH_TIMEOUT")
            .env_remove("CDKFETCH_LOG")
            .env_remove("RUST_LOG");
        cmd
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

/// The first stderr line that parses as a JSON object.
///
/// Diagnostic log lines may precede the error document.
#[must_use]
pub fn stderr_json(stderr: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .filter(|line| line.trim_start().starts_with('{'))
        .find_map(|line| serde_json::from_str(line).ok())
        .unwrap_or_else(|| panic!("no JSON object on stderr:\n{text}"))
}
