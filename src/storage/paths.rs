//! Application paths for config and data.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Application paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
    /// Data directory.
    pub data: PathBuf,
}

impl AppPaths {
    /// Create paths for the cdkfetch application.
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("io", "cdkfetch", "cdkfetch") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
                data: proj_dirs.data_dir().to_path_buf(),
            }
        } else {
            // Fallback to home directory
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            Self {
                config: home.join(".config/cdkfetch"),
                data: home.join(".local/share/cdkfetch"),
            }
        }
    }

    /// Paths rooted at `base`, used by tests and portable installs.
    #[must_use]
    pub fn under(base: &Path) -> Self {
        Self {
            config: base.join("config"),
            data: base.join("data"),
        }
    }

    /// Path to the TOML config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Path to the accounts file.
    #[must_use]
    pub fn accounts_file(&self) -> PathBuf {
        self.config.join("accounts.json")
    }

    /// Directory holding one session artifact per identity.
    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.data.join("sessions")
    }

    /// Directory for failure screenshots.
    #[must_use]
    pub fn screenshots_dir(&self) -> PathBuf {
        self.data.join("screenshots")
    }

    /// Ensure all directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config)?;
        std::fs::create_dir_all(self.sessions_dir())?;
        Ok(())
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// Module-level function for accessing dirs crate.
mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_live_under_base() {
        let paths = AppPaths::under(Path::new("/tmp/cdk"));
        assert_eq!(paths.config_file(), Path::new("/tmp/cdk/config/config.toml"));
        assert_eq!(paths.accounts_file(), Path::new("/tmp/cdk/config/accounts.json"));
        assert_eq!(paths.sessions_dir(), Path::new("/tmp/cdk/data/sessions"));
    }

    #[test]
    fn ensure_dirs_creates_sessions_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::under(dir.path());
        paths.ensure_dirs().unwrap();
        assert!(paths.sessions_dir().is_dir());
        assert!(paths.config.is_dir());
    }
}
