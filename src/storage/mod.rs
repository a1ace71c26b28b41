//! Storage for configuration, accounts, and cached sessions.

pub mod accounts;
pub mod config;
pub mod paths;
pub mod session_store;

pub use accounts::{Account, AccountStore, LoginCredentials};
pub use config::{
    Config, ConfigSource, ConfigSources, ProvidersConfig, ENV_ACCOUNTS, ENV_CONFIG, ENV_FORMAT, ENV_NO_COLOR,
    ENV_NO_COLOR_STD, ENV_PRETTY, ENV_PROVIDERS, ENV_PROXY, ENV_TIMEOUT, ENV_VERBOSE,
    ResolvedConfig,
};
pub use paths::AppPaths;
pub use session_store::{SessionStore, StoredSession};
