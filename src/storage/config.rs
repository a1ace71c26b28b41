//! Configuration file loading and management.
//!
//! Loads configuration from:
//! - Linux: `~/.config/cdkfetch/config.toml`
//! - macOS: `~/Library/Application Support/io.cdkfetch.cdkfetch/config.toml`
//! - Windows: `%APPDATA%/cdkfetch/cdkfetch/config/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `CDKFETCH_PROVIDERS`: Comma-separated provider list (e.g., "x666,b4u")
//! - `CDKFETCH_FORMAT`: Output format (human, json, md)
//! - `CDKFETCH_TIMEOUT`: Per-request timeout in seconds
//! - `CDKFETCH_PROXY`: Proxy URL for accounts without their own
//! - `CDKFETCH_ACCOUNTS`: Accounts file path
//! - `CDKFETCH_NO_COLOR` or `NO_COLOR`: Disable colors (1, true, yes)
//! - `CDKFETCH_VERBOSE`: Enable verbose output (1, true, yes)
//! - `CDKFETCH_PRETTY`: Pretty-print JSON output (1, true, yes)
//! - `CDKFETCH_CONFIG`: Override config file path

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::cli::args::{AcquireArgs, Cli, OutputFormat};
use crate::core::provider::{Provider, ProviderSelection};
use crate::core::session::SessionTimings;
use crate::error::{CdkError, Result};

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable for comma-separated provider list.
pub const ENV_PROVIDERS: &str = "CDKFETCH_PROVIDERS";
/// Environment variable for output format.
pub const ENV_FORMAT: &str = "CDKFETCH_FORMAT";
/// Environment variable for timeout in seconds.
pub const ENV_TIMEOUT: &str = "CDKFETCH_TIMEOUT";
/// Environment variable for the default proxy.
pub const ENV_PROXY: &str = "CDKFETCH_PROXY";
/// Environment variable for the accounts file path.
pub const ENV_ACCOUNTS: &str = "CDKFETCH_ACCOUNTS";
/// Environment variable to disable colors.
pub const ENV_NO_COLOR: &str = "CDKFETCH_NO_COLOR";
/// Standard environment variable to disable colors.
pub const ENV_NO_COLOR_STD: &str = "NO_COLOR";
/// Environment variable for verbose output.
pub const ENV_VERBOSE: &str = "CDKFETCH_VERBOSE";
/// Environment variable for pretty JSON output.
pub const ENV_PRETTY: &str = "CDKFETCH_PRETTY";
/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "CDKFETCH_CONFIG";

/// Environment lookup used during resolution.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Providers to run.
    pub providers: ProviderSelection,
    /// Output format.
    pub format: OutputFormat,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Overall deadline per account+provider run.
    pub deadline: Option<Duration>,
    /// Same-step retries after a transient failure.
    pub retry_budget: u32,
    /// Proxy for accounts without their own.
    pub proxy: Option<String>,
    /// Accounts file path.
    pub accounts_file: PathBuf,
    /// Directory holding cached sessions.
    pub sessions_dir: PathBuf,
    /// Where failure screenshots go.
    pub screenshot_dir: PathBuf,
    /// Whether to disable colored output.
    pub no_color: bool,
    /// Whether verbose logging is enabled.
    pub verbose: bool,
    /// Whether to pretty-print JSON output.
    pub pretty: bool,
    /// The file-level config, for browser and provider sections.
    pub file: Config,
    /// Source of each setting for debugging.
    pub sources: ConfigSources,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub providers: ConfigSource,
    pub format: ConfigSource,
    pub timeout: ConfigSource,
    pub deadline: ConfigSource,
    pub proxy: ConfigSource,
    pub accounts_file: ConfigSource,
    pub no_color: ConfigSource,
    pub verbose: ConfigSource,
    pub pretty: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl ConfigSource {
    /// Whether the user chose this value explicitly for this invocation.
    #[must_use]
    pub const fn is_explicit(self) -> bool {
        matches!(self, Self::Cli | Self::Env)
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl ResolvedConfig {
    /// Resolve final configuration from CLI args, environment variables, and config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but is invalid, or any
    /// resolved value is invalid (e.g., unknown provider).
    pub fn resolve(cli: &Cli, args: Option<&AcquireArgs>) -> Result<Self> {
        let config = Self::load_config(&process_env)?;
        Self::resolve_from(cli, args, config, &AppPaths::new(), &process_env)
    }

    /// Resolve against an already loaded config and an explicit environment.
    pub fn resolve_from(
        cli: &Cli,
        args: Option<&AcquireArgs>,
        config: Config,
        paths: &AppPaths,
        env: EnvLookup<'_>,
    ) -> Result<Self> {
        config.validate()?;

        let mut sources = ConfigSources::default();

        let providers = Self::resolve_providers(args, &config, env, &mut sources.providers)?;
        let format = Self::resolve_format(cli, &config, env, &mut sources.format)?;
        let timeout = Self::resolve_timeout(args, &config, env, &mut sources.timeout);
        let deadline = Self::resolve_deadline(args, &config, &mut sources.deadline);
        let proxy = Self::resolve_proxy(&config, env, &mut sources.proxy);
        let accounts_file =
            Self::resolve_accounts_file(&config, paths, env, &mut sources.accounts_file);
        let no_color = Self::resolve_no_color(cli, &config, env, &mut sources.no_color);
        let verbose = Self::resolve_verbose(cli, env, &mut sources.verbose);
        let pretty = Self::resolve_pretty(cli, &config, env, &mut sources.pretty);

        Ok(Self {
            providers,
            format,
            timeout,
            deadline,
            retry_budget: config.general.retry_budget,
            proxy,
            accounts_file,
            sessions_dir: paths.sessions_dir(),
            screenshot_dir: config
                .browser
                .screenshot_dir
                .clone()
                .unwrap_or_else(|| paths.screenshots_dir()),
            no_color,
            verbose,
            pretty,
            file: config,
            sources,
        })
    }

    /// Load config file, respecting `CDKFETCH_CONFIG` override.
    pub fn load_config(env: EnvLookup<'_>) -> Result<Config> {
        if let Some(path) = env(ENV_CONFIG) {
            Config::load_from(Path::new(&path))
        } else {
            Config::load()
        }
    }

    fn resolve_providers(
        args: Option<&AcquireArgs>,
        config: &Config,
        env: EnvLookup<'_>,
        source: &mut ConfigSource,
    ) -> Result<ProviderSelection> {
        // 1. CLI flag
        if let Some(arg) = args.and_then(|a| a.provider.as_deref()) {
            *source = ConfigSource::Cli;
            return ProviderSelection::from_arg(arg);
        }

        // 2. Environment variable
        if let Some(providers_env) = env(ENV_PROVIDERS) {
            *source = ConfigSource::Env;
            return ProviderSelection::from_arg(&providers_env);
        }

        // 3. Config file
        if !config.providers.default_providers.is_empty() {
            *source = ConfigSource::ConfigFile;
            return ProviderSelection::from_arg(&config.providers.default_providers.join(","));
        }

        // 4. Default
        *source = ConfigSource::Default;
        Ok(ProviderSelection::All)
    }

    fn resolve_format(
        cli: &Cli,
        config: &Config,
        env: EnvLookup<'_>,
        source: &mut ConfigSource,
    ) -> Result<OutputFormat> {
        // 1. CLI --json flag (shorthand)
        if cli.json {
            *source = ConfigSource::Cli;
            return Ok(OutputFormat::Json);
        }

        // 2. Environment variable
        // clap fills in a default for --format, so an explicit `--format human`
        // is indistinguishable from no flag and yields to the environment.
        if let Some(format_env) = env(ENV_FORMAT) {
            *source = ConfigSource::Env;
            return Self::parse_format(&format_env);
        }

        if cli.format != OutputFormat::Human {
            *source = ConfigSource::Cli;
            return Ok(cli.format);
        }

        // 3. Config file
        if let Some(ref format_str) = config.output.format {
            *source = ConfigSource::ConfigFile;
            return Self::parse_format(format_str);
        }

        // 4. Default (from clap)
        *source = ConfigSource::Default;
        Ok(OutputFormat::Human)
    }

    /// Parse a format string into `OutputFormat`.
    fn parse_format(s: &str) -> Result<OutputFormat> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Md),
            _ => Err(CdkError::Config(format!(
                "Invalid format '{s}'. Valid formats: human, json, md"
            ))),
        }
    }

    fn resolve_timeout(
        args: Option<&AcquireArgs>,
        config: &Config,
        env: EnvLookup<'_>,
        source: &mut ConfigSource,
    ) -> Duration {
        // 1. CLI --timeout flag
        if let Some(timeout) = args.and_then(|a| a.timeout) {
            *source = ConfigSource::Cli;
            return Duration::from_secs(timeout);
        }

        // 2. Environment variable
        if let Some(timeout) = env(ENV_TIMEOUT)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|t| *t > 0)
        {
            *source = ConfigSource::Env;
            return Duration::from_secs(timeout);
        }

        // 3. Config file
        *source = ConfigSource::ConfigFile;
        Duration::from_secs(config.general.timeout_seconds)
    }

    fn resolve_deadline(
        args: Option<&AcquireArgs>,
        config: &Config,
        source: &mut ConfigSource,
    ) -> Option<Duration> {
        if let Some(deadline) = args.and_then(|a| a.deadline) {
            *source = ConfigSource::Cli;
            return Some(Duration::from_secs(deadline));
        }
        if let Some(deadline) = config.general.deadline_seconds {
            *source = ConfigSource::ConfigFile;
            return Some(Duration::from_secs(deadline));
        }
        *source = ConfigSource::Default;
        None
    }

    fn resolve_proxy(config: &Config, env: EnvLookup<'_>, source: &mut ConfigSource) -> Option<String> {
        if let Some(proxy) = env(ENV_PROXY).filter(|p| !p.trim().is_empty()) {
            *source = ConfigSource::Env;
            return Some(proxy);
        }
        if let Some(proxy) = &config.general.proxy {
            *source = ConfigSource::ConfigFile;
            return Some(proxy.clone());
        }
        *source = ConfigSource::Default;
        None
    }

    fn resolve_accounts_file(
        config: &Config,
        paths: &AppPaths,
        env: EnvLookup<'_>,
        source: &mut ConfigSource,
    ) -> PathBuf {
        if let Some(path) = env(ENV_ACCOUNTS).filter(|p| !p.trim().is_empty()) {
            *source = ConfigSource::Env;
            return PathBuf::from(path);
        }
        if let Some(path) = &config.general.accounts_file {
            *source = ConfigSource::ConfigFile;
            return path.clone();
        }
        *source = ConfigSource::Default;
        paths.accounts_file()
    }

    fn resolve_no_color(cli: &Cli, config: &Config, env: EnvLookup<'_>, source: &mut ConfigSource) -> bool {
        // 1. CLI --no-color flag
        if cli.no_color {
            *source = ConfigSource::Cli;
            return true;
        }

        // 2. Environment variable (CDKFETCH_NO_COLOR or standard NO_COLOR)
        if is_env_truthy(env, ENV_NO_COLOR) || env(ENV_NO_COLOR_STD).is_some() {
            *source = ConfigSource::Env;
            return true;
        }

        // 3. Config file (inverted: config.output.color = false means no_color = true)
        if !config.output.color {
            *source = ConfigSource::ConfigFile;
            return true;
        }

        // 4. Default
        *source = ConfigSource::Default;
        false
    }

    fn resolve_verbose(cli: &Cli, env: EnvLookup<'_>, source: &mut ConfigSource) -> bool {
        if cli.verbose {
            *source = ConfigSource::Cli;
            return true;
        }
        if is_env_truthy(env, ENV_VERBOSE) {
            *source = ConfigSource::Env;
            return true;
        }
        *source = ConfigSource::Default;
        false
    }

    fn resolve_pretty(cli: &Cli, config: &Config, env: EnvLookup<'_>, source: &mut ConfigSource) -> bool {
        if cli.pretty {
            *source = ConfigSource::Cli;
            return true;
        }
        if is_env_truthy(env, ENV_PRETTY) {
            *source = ConfigSource::Env;
            return true;
        }
        if config.output.pretty {
            *source = ConfigSource::ConfigFile;
            return true;
        }
        *source = ConfigSource::Default;
        false
    }

    /// Whether the provider selection was chosen for this run rather than
    /// inherited from defaults.
    #[must_use]
    pub const fn providers_explicit(&self) -> bool {
        self.sources.providers.is_explicit()
    }
}

/// Check if an environment variable is set to a truthy value.
fn is_env_truthy(env: EnvLookup<'_>, var: &str) -> bool {
    env(var).is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

// =============================================================================
// File Configuration
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Browser automation settings.
    pub browser: BrowserConfig,
    /// Provider-specific settings.
    pub providers: ProvidersConfig,
    /// Output settings.
    pub output: OutputConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Overall deadline per account+provider run, in seconds.
    pub deadline_seconds: Option<u64>,
    /// Same-step retries after a transient failure.
    pub retry_budget: u32,
    /// Proxy for accounts without their own.
    pub proxy: Option<String>,
    /// Accounts file path.
    pub accounts_file: Option<PathBuf>,
    /// Default log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint.
    pub webdriver_url: String,
    pub headless: bool,
    /// Draws assumed when the page shows no readable count.
    pub assumed_allowance: u32,
    /// Wait after navigation, in milliseconds.
    pub settle_ms: u64,
    /// Wait after clicking the draw control, in milliseconds.
    pub spin_wait_ms: u64,
    /// Wait between draws, in milliseconds.
    pub between_spins_ms: u64,
    /// Wait after submitting login credentials, in milliseconds.
    pub login_submit_ms: u64,
    /// How long to wait for the consent control, in milliseconds.
    pub consent_timeout_ms: u64,
    /// Where failure screenshots go; defaults to `<data_dir>/screenshots`.
    pub screenshot_dir: Option<PathBuf>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Providers to run when none are specified.
    pub default_providers: Vec<String>,
    #[serde(rename = "runawaytime-checkin")]
    pub runawaytime_checkin: ProviderSettings,
    #[serde(rename = "runawaytime-wheel")]
    pub runawaytime_wheel: ProviderSettings,
    pub x666: ProviderSettings,
    pub b4u: ProviderSettings,
}

/// Settings for a specific provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Whether this provider is enabled.
    pub enabled: bool,
    /// Custom base URL (if different from default).
    pub api_base: Option<String>,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format (human, json, md).
    pub format: Option<String>,
    /// Whether to use colors in output.
    pub color: bool,
    /// Whether to pretty-print JSON output.
    pub pretty: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: crate::core::http::DEFAULT_TIMEOUT.as_secs(),
            deadline_seconds: None,
            retry_budget: crate::core::spin_loop::DEFAULT_RETRY_BUDGET,
            proxy: None,
            accounts_file: None,
            log_level: None,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            headless: true,
            assumed_allowance: 5,
            settle_ms: 5_000,
            spin_wait_ms: 6_000,
            between_spins_ms: 2_000,
            login_submit_ms: 10_000,
            consent_timeout_ms: 30_000,
            screenshot_dir: None,
        }
    }
}

impl BrowserConfig {
    /// Waits used by the session manager.
    #[must_use]
    pub const fn session_timings(&self) -> SessionTimings {
        SessionTimings {
            settle: Duration::from_millis(self.settle_ms),
            after_click: Duration::from_millis(self.settle_ms),
            after_submit: Duration::from_millis(self.login_submit_ms),
            consent_timeout: Duration::from_millis(self.consent_timeout_ms),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: None,
        }
    }
}

impl ProvidersConfig {
    /// Settings block for a provider.
    #[must_use]
    pub const fn settings(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::RunawaytimeCheckin => &self.runawaytime_checkin,
            Provider::RunawaytimeWheel => &self.runawaytime_wheel,
            Provider::X666 => &self.x666,
            Provider::B4u => &self.b4u,
        }
    }

    /// Base URL for a provider, without a trailing slash.
    #[must_use]
    pub fn base_url(&self, provider: Provider) -> String {
        self.settings(provider)
            .api_base
            .as_deref()
            .unwrap_or_else(|| provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    #[must_use]
    pub const fn is_enabled(&self, provider: Provider) -> bool {
        self.settings(provider).enabled
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: None,
            color: true,
            pretty: false,
        }
    }
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns error only if the file exists but is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CdkError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CdkError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)?;
        tracing::debug!(?path, "Config file saved");
        Ok(())
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_path() -> PathBuf {
        AppPaths::new().config_file()
    }

    /// Validate configuration values.
    ///
    /// Checks that:
    /// - Provider names are valid
    /// - Output format is valid (human, json, md)
    /// - Timeout is within reasonable bounds (1-300 seconds)
    /// - Retry budget is at most 10
    pub fn validate(&self) -> Result<()> {
        let valid_providers = Provider::ALL
            .iter()
            .map(|provider| provider.cli_name())
            .collect::<Vec<_>>()
            .join(", ");

        for name in &self.providers.default_providers {
            Provider::from_cli_name(name).map_err(|_| {
                CdkError::Config(format!(
                    "Invalid provider \"{name}\" in default_providers. Valid providers: {valid_providers}",
                ))
            })?;
        }

        if let Some(format) = &self.output.format
            && !["human", "json", "md"].contains(&format.as_str())
        {
            return Err(CdkError::Config(format!(
                "Invalid format \"{format}\". Valid formats: human, json, md"
            )));
        }

        if self.general.timeout_seconds == 0 || self.general.timeout_seconds > 300 {
            return Err(CdkError::Config(
                "Timeout must be between 1 and 300 seconds".to_string(),
            ));
        }

        if self.general.deadline_seconds == Some(0) {
            return Err(CdkError::Config(
                "Deadline must be greater than 0 seconds".to_string(),
            ));
        }

        if self.general.retry_budget > 10 {
            return Err(CdkError::Config(
                "Retry budget must be between 0 and 10".to_string(),
            ));
        }

        if self.browser.assumed_allowance == 0 {
            return Err(CdkError::Config(
                "browser.assumed_allowance must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper to create a default CLI struct for testing.
    fn make_test_cli() -> Cli {
        Cli {
            command: None,
            format: OutputFormat::Human,
            json: false,
            pretty: false,
            no_color: false,
            log_level: None,
            json_output: false,
            verbose: false,
        }
    }

    fn resolve_with(
        cli: &Cli,
        args: Option<&AcquireArgs>,
        config: Config,
        vars: &[(&str, &str)],
    ) -> Result<ResolvedConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let env = move |key: &str| map.get(key).cloned();
        let paths = AppPaths::under(Path::new("/tmp/cdkfetch-test"));
        ResolvedConfig::resolve_from(cli, args, config, &paths, &env)
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.general.timeout_seconds, 30);
        assert_eq!(
            Duration::from_secs(config.general.timeout_seconds),
            crate::core::http::DEFAULT_TIMEOUT
        );
        assert_eq!(config.general.retry_budget, 2);
        assert_eq!(config.browser.assumed_allowance, 5);
        assert!(config.output.color);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_missing_file_returns_default() {
        let config = Config::load_from(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(config.general.timeout_seconds, 30);
    }

    #[test]
    fn load_valid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[general]
timeout_seconds = 60
retry_budget = 4
proxy = "http://127.0.0.1:7890"

[browser]
webdriver_url = "http://driver:4444"
assumed_allowance = 3

[providers.runawaytime-wheel]
enabled = false

[providers.x666]
api_base = "http://localhost:9000/"

[output]
color = false
pretty = true
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.general.timeout_seconds, 60);
        assert_eq!(config.general.retry_budget, 4);
        assert_eq!(config.browser.webdriver_url, "http://driver:4444");
        assert_eq!(config.browser.assumed_allowance, 3);
        assert_eq!(config.browser.spin_wait_ms, 6_000);
        assert!(!config.providers.is_enabled(Provider::RunawaytimeWheel));
        assert!(config.providers.is_enabled(Provider::RunawaytimeCheckin));
        assert_eq!(
            config.providers.base_url(Provider::X666),
            "http://localhost:9000"
        );
        assert_eq!(
            config.providers.base_url(Provider::B4u),
            "https://tw.b4u.qzz.io"
        );
        assert!(!config.output.color);
        assert!(config.output.pretty);
    }

    #[test]
    fn load_invalid_toml_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not valid toml {{{{").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, CdkError::ConfigParse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.general.timeout_seconds = 120;
        config.general.deadline_seconds = Some(600);
        config.output.pretty = true;

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.general.timeout_seconds, 120);
        assert_eq!(loaded.general.deadline_seconds, Some(600));
        assert!(loaded.output.pretty);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.providers.default_providers = vec!["invalid_provider".to_string()];
        assert!(config.validate().unwrap_err().to_string().contains("Invalid provider"));

        let mut config = Config::default();
        config.general.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.retry_budget = 11;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.format = Some("xml".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_source_display() {
        assert_eq!(format!("{}", ConfigSource::Cli), "CLI flag");
        assert_eq!(format!("{}", ConfigSource::Env), "environment variable");
        assert_eq!(format!("{}", ConfigSource::ConfigFile), "config file");
        assert_eq!(format!("{}", ConfigSource::Default), "default");
    }

    #[test]
    fn resolved_defaults() {
        let resolved = resolve_with(&make_test_cli(), None, Config::default(), &[]).unwrap();
        assert_eq!(resolved.providers, ProviderSelection::All);
        assert!(!resolved.providers_explicit());
        assert_eq!(resolved.format, OutputFormat::Human);
        assert_eq!(resolved.timeout, Duration::from_secs(30));
        assert!(resolved.deadline.is_none());
        assert!(resolved.proxy.is_none());
        assert_eq!(
            resolved.accounts_file,
            Path::new("/tmp/cdkfetch-test/config/accounts.json")
        );
        assert!(!resolved.no_color);
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let mut config = Config::default();
        config.general.timeout_seconds = 45;
        config.providers.default_providers = vec!["b4u".to_string()];

        let resolved = resolve_with(&make_test_cli(), None, config.clone(), &[]).unwrap();
        assert_eq!(resolved.timeout, Duration::from_secs(45));
        assert_eq!(resolved.sources.timeout, ConfigSource::ConfigFile);
        assert_eq!(resolved.providers, ProviderSelection::Single(Provider::B4u));

        let env = [(ENV_TIMEOUT, "12"), (ENV_PROVIDERS, "x666")];
        let resolved = resolve_with(&make_test_cli(), None, config.clone(), &env).unwrap();
        assert_eq!(resolved.timeout, Duration::from_secs(12));
        assert_eq!(resolved.sources.timeout, ConfigSource::Env);
        assert_eq!(resolved.providers, ProviderSelection::Single(Provider::X666));
        assert!(resolved.providers_explicit());

        let args = AcquireArgs {
            provider: Some("runawaytime-checkin".to_string()),
            timeout: Some(5),
            ..AcquireArgs::default()
        };
        let resolved = resolve_with(&make_test_cli(), Some(&args), config, &env).unwrap();
        assert_eq!(resolved.timeout, Duration::from_secs(5));
        assert_eq!(resolved.sources.timeout, ConfigSource::Cli);
        assert_eq!(
            resolved.providers,
            ProviderSelection::Single(Provider::RunawaytimeCheckin)
        );
    }

    #[test]
    fn env_format_and_colors() {
        let env = [(ENV_FORMAT, "md"), (ENV_NO_COLOR_STD, ""), (ENV_PRETTY, "yes")];
        let resolved = resolve_with(&make_test_cli(), None, Config::default(), &env).unwrap();
        assert_eq!(resolved.format, OutputFormat::Md);
        assert!(resolved.no_color);
        assert!(resolved.pretty);

        let mut cli = make_test_cli();
        cli.json = true;
        let resolved = resolve_with(&cli, None, Config::default(), &env).unwrap();
        assert_eq!(resolved.format, OutputFormat::Json);
        assert_eq!(resolved.sources.format, ConfigSource::Cli);
    }

    #[test]
    fn invalid_env_format_is_error() {
        let env = [(ENV_FORMAT, "yaml")];
        assert!(resolve_with(&make_test_cli(), None, Config::default(), &env).is_err());
    }

    #[test]
    fn proxy_and_accounts_from_env() {
        let env = [
            (ENV_PROXY, "socks5://127.0.0.1:1080"),
            (ENV_ACCOUNTS, "/srv/accounts.json"),
        ];
        let resolved = resolve_with(&make_test_cli(), None, Config::default(), &env).unwrap();
        assert_eq!(resolved.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(resolved.accounts_file, Path::new("/srv/accounts.json"));
        assert_eq!(resolved.sources.accounts_file, ConfigSource::Env);
    }

    #[test]
    fn deadline_from_cli_or_file() {
        let mut config = Config::default();
        config.general.deadline_seconds = Some(300);
        let resolved = resolve_with(&make_test_cli(), None, config.clone(), &[]).unwrap();
        assert_eq!(resolved.deadline, Some(Duration::from_secs(300)));

        let args = AcquireArgs {
            deadline: Some(20),
            ..AcquireArgs::default()
        };
        let resolved = resolve_with(&make_test_cli(), Some(&args), config, &[]).unwrap();
        assert_eq!(resolved.deadline, Some(Duration::from_secs(20)));
    }
}
