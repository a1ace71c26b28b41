//! Error types for cdkfetch.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors are categorized into six main categories:
//! - **Authentication**: Session establishment (login, consent) failures
//! - **Network**: Connection, timeout, or proxy issues
//! - **Configuration**: Config/accounts file problems or missing credentials
//! - **Provider**: Provider API errors and partial failures
//! - **Environment**: Browser automation driver issues
//! - **Internal**: Unexpected errors, bugs, or unclassified issues
//!
//! Each error has a stable error code (e.g., `CDK-C001`) for programmatic handling.
//!
//! Attempt-level faults (timeouts, unparseable bodies) never show up here during
//! a reward loop: the action executor folds them into a
//! [`Classification`](crate::core::models::Classification). Only configuration and
//! session faults abort a whole account run.

pub mod suggestions;

use thiserror::Error;

pub use suggestions::FixSuggestion;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Login, consent, or session restore failures.
    Authentication,
    /// Network issues (timeout, connection refused, proxy).
    Network,
    /// Configuration issues (parse errors, invalid values, missing credentials).
    Configuration,
    /// Provider-specific issues (API errors, partial failures).
    Provider,
    /// Environment issues (browser driver unavailable).
    Environment,
    /// Internal errors (bugs, unexpected state, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Authentication => "Authentication error",
            Self::Network => "Network error",
            Self::Configuration => "Configuration error",
            Self::Provider => "Provider error",
            Self::Environment => "Environment error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Authentication => "A",
            Self::Network => "N",
            Self::Configuration => "C",
            Self::Provider => "P",
            Self::Environment => "E",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure, or at least one account run did not finish cleanly
    GeneralError = 1,
    /// Browser driver not reachable
    DriverUnavailable = 2,
    /// Configuration, accounts file, or credential problems
    ConfigError = 3,
    /// Timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// Main error type for cdkfetch operations.
#[derive(Error, Debug)]
pub enum CdkError {
    // ==========================================================================
    // Authentication errors (Category: Authentication)
    // ==========================================================================
    /// Interactive login or consent did not reach an authenticated page.
    #[error("session establishment failed for {provider} at {stage}: {reason}")]
    SessionEstablishment {
        provider: String,
        stage: String,
        reason: String,
    },

    // ==========================================================================
    // Network errors (Category: Network)
    // ==========================================================================
    /// Request timed out.
    #[error("request timeout after {0} seconds")]
    Timeout(u64),

    /// A whole account run exceeded its deadline.
    #[error("run timeout after {seconds}s for {provider}")]
    TimeoutWithProvider { provider: String, seconds: u64 },

    /// Generic network error.
    #[error("network error: {0}")]
    Network(String),

    // ==========================================================================
    // Configuration errors (Category: Configuration)
    // ==========================================================================
    /// A credential the provider needs is absent from the account entry.
    #[error("account {account} is missing {credential} required by {provider}")]
    CredentialMissing {
        account: String,
        provider: String,
        credential: String,
    },

    /// Error parsing a configuration or accounts file.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid provider name.
    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    /// Specified account not found.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// Accounts file has no usable entries.
    #[error("no accounts configured in {0}")]
    NoAccountsConfigured(String),

    // ==========================================================================
    // Provider errors (Category: Provider)
    // ==========================================================================
    /// Provider API returned an error outside a reward loop.
    #[error("provider {provider} API error: {message}")]
    ProviderApiError {
        provider: String,
        status_code: Option<u16>,
        message: String,
    },

    /// Failed to parse provider response.
    #[error("failed to parse response: {0}")]
    ParseResponse(String),

    /// Some account runs succeeded, some did not.
    #[error("partial failure: {failed} run(s) did not finish cleanly")]
    PartialFailure { failed: usize },

    // ==========================================================================
    // Environment errors (Category: Environment)
    // ==========================================================================
    /// WebDriver endpoint unreachable or refused to open a session.
    #[error("browser driver unavailable at {url}: {message}")]
    DriverUnavailable { url: String, message: String },

    /// A browser primitive failed (element lookup, script, navigation).
    #[error("browser error: {0}")]
    Browser(String),

    // ==========================================================================
    // I/O errors (Category: Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CdkError {
    /// Map error to process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::DriverUnavailable { .. } => ExitCode::DriverUnavailable,

            Self::CredentialMissing { .. }
            | Self::ConfigParse { .. }
            | Self::Config(_)
            | Self::InvalidProvider(_)
            | Self::AccountNotFound(_)
            | Self::NoAccountsConfigured(_) => ExitCode::ConfigError,

            Self::Timeout(_) | Self::TimeoutWithProvider { .. } => ExitCode::Timeout,

            Self::SessionEstablishment { .. }
            | Self::Network(_)
            | Self::ProviderApiError { .. }
            | Self::ParseResponse(_)
            | Self::PartialFailure { .. }
            | Self::Browser(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::SessionEstablishment { .. } => ErrorCategory::Authentication,

            Self::Timeout(_) | Self::TimeoutWithProvider { .. } | Self::Network(_) => {
                ErrorCategory::Network
            }

            Self::CredentialMissing { .. }
            | Self::ConfigParse { .. }
            | Self::Config(_)
            | Self::InvalidProvider(_)
            | Self::AccountNotFound(_)
            | Self::NoAccountsConfigured(_) => ErrorCategory::Configuration,

            Self::ProviderApiError { .. } | Self::ParseResponse(_) | Self::PartialFailure { .. } => {
                ErrorCategory::Provider
            }

            Self::DriverUnavailable { .. } | Self::Browser(_) => ErrorCategory::Environment,

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `CDK-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::SessionEstablishment { .. } => "CDK-A001",

            Self::Timeout(_) => "CDK-N001",
            Self::TimeoutWithProvider { .. } => "CDK-N002",
            Self::Network(_) => "CDK-N099",

            Self::CredentialMissing { .. } => "CDK-C001",
            Self::ConfigParse { .. } => "CDK-C002",
            Self::Config(_) => "CDK-C004",
            Self::InvalidProvider(_) => "CDK-C010",
            Self::AccountNotFound(_) => "CDK-C020",
            Self::NoAccountsConfigured(_) => "CDK-C021",

            Self::ProviderApiError { .. } => "CDK-P003",
            Self::ParseResponse(_) => "CDK-P020",
            Self::PartialFailure { .. } => "CDK-P030",

            Self::DriverUnavailable { .. } => "CDK-E001",
            Self::Browser(_) => "CDK-E002",

            Self::Io(_) => "CDK-X001",
            Self::Json(_) => "CDK-X002",
            Self::Other(_) => "CDK-X099",
        }
    }

    /// Returns whether the error is potentially recoverable by retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::TimeoutWithProvider { .. } | Self::Network(_)
        )
    }

    /// Whether this error should abort the whole account run rather than
    /// being absorbed into an attempt classification.
    #[must_use]
    pub const fn aborts_run(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Authentication
        ) || matches!(self, Self::DriverUnavailable { .. })
    }

    /// Returns the provider name if this error is provider-specific.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::SessionEstablishment { provider, .. }
            | Self::TimeoutWithProvider { provider, .. }
            | Self::CredentialMissing { provider, .. }
            | Self::ProviderApiError { provider, .. } => Some(provider),
            Self::InvalidProvider(p) => Some(p),
            _ => None,
        }
    }

    /// Returns actionable fix suggestions for this error.
    #[must_use]
    pub fn fix_suggestions(&self) -> Vec<FixSuggestion> {
        match self {
            Self::SessionEstablishment {
                provider, stage, ..
            } => suggestions::session_failed_suggestions(provider, stage),
            Self::Timeout(seconds) => suggestions::timeout_suggestions("unknown", *seconds),
            Self::TimeoutWithProvider { provider, seconds } => {
                suggestions::timeout_suggestions(provider, *seconds)
            }
            Self::Network(msg) => suggestions::network_suggestions(msg),
            Self::CredentialMissing {
                account,
                provider,
                credential,
            } => suggestions::credential_missing_suggestions(account, provider, credential),
            Self::ConfigParse { path, message } => {
                suggestions::config_parse_suggestions(path, message)
            }
            Self::InvalidProvider(name) => suggestions::invalid_provider_suggestions(name),
            Self::AccountNotFound(name) => suggestions::account_not_found_suggestions(name),
            Self::NoAccountsConfigured(path) => suggestions::no_accounts_suggestions(path),
            Self::DriverUnavailable { url, .. } => suggestions::driver_unavailable_suggestions(url),
            _ => Vec::new(),
        }
    }
}

/// Result type alias using `CdkError`.
pub type Result<T> = std::result::Result<T, CdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_map_to_config_exit_code() {
        let err = CdkError::CredentialMissing {
            account: "alice".to_string(),
            provider: "x666".to_string(),
            credential: "access_token".to_string(),
        };
        assert_eq!(err.exit_code(), ExitCode::ConfigError);
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.aborts_run());
    }

    #[test]
    fn session_errors_abort_the_run() {
        let err = CdkError::SessionEstablishment {
            provider: "b4u".to_string(),
            stage: "authenticating".to_string(),
            reason: "login form missing".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert!(err.aborts_run());
        assert!(!err.is_retryable());
    }

    #[test]
    fn network_errors_are_retryable_and_do_not_abort() {
        let err = CdkError::Network("connection reset".to_string());
        assert!(err.is_retryable());
        assert!(!err.aborts_run());
        assert_eq!(CdkError::Timeout(30).exit_code(), ExitCode::Timeout);
    }

    #[test]
    fn error_codes_follow_format() {
        let errors: Vec<CdkError> = vec![
            CdkError::Timeout(30),
            CdkError::Config("test".to_string()),
            CdkError::Browser("no element".to_string()),
            CdkError::PartialFailure { failed: 1 },
        ];

        for err in errors {
            let code = err.error_code();
            assert!(code.starts_with("CDK-"), "Error code {code} should start with CDK-");
            assert_eq!(code.len(), 8, "Error code {code} should be 8 chars");
            let prefix = err.category().code_prefix();
            assert_eq!(&code[4..5], prefix);
        }
    }

    #[test]
    fn error_codes_are_unique() {
        use std::collections::HashSet;

        let codes = vec![
            CdkError::SessionEstablishment {
                provider: String::new(),
                stage: String::new(),
                reason: String::new(),
            }
            .error_code(),
            CdkError::Timeout(0).error_code(),
            CdkError::TimeoutWithProvider {
                provider: String::new(),
                seconds: 0,
            }
            .error_code(),
            CdkError::Network(String::new()).error_code(),
            CdkError::CredentialMissing {
                account: String::new(),
                provider: String::new(),
                credential: String::new(),
            }
            .error_code(),
            CdkError::ConfigParse {
                path: String::new(),
                message: String::new(),
            }
            .error_code(),
            CdkError::Config(String::new()).error_code(),
            CdkError::InvalidProvider(String::new()).error_code(),
            CdkError::AccountNotFound(String::new()).error_code(),
            CdkError::NoAccountsConfigured(String::new()).error_code(),
            CdkError::ParseResponse(String::new()).error_code(),
            CdkError::PartialFailure { failed: 0 }.error_code(),
            CdkError::DriverUnavailable {
                url: String::new(),
                message: String::new(),
            }
            .error_code(),
            CdkError::Browser(String::new()).error_code(),
        ];

        let unique: HashSet<_> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len(), "Error codes should be unique");
    }

    #[test]
    fn credential_missing_has_suggestions() {
        let err = CdkError::CredentialMissing {
            account: "alice".to_string(),
            provider: "runawaytime-wheel".to_string(),
            credential: "fuli_cookies".to_string(),
        };
        let suggestions = err.fix_suggestions();
        assert!(!suggestions.is_empty());
        assert!(suggestions[0].context.contains("fuli_cookies"));
    }

    #[test]
    fn provider_extraction() {
        let err = CdkError::TimeoutWithProvider {
            provider: "b4u".to_string(),
            seconds: 10,
        };
        assert_eq!(err.provider(), Some("b4u"));
        assert_eq!(CdkError::Timeout(3).provider(), None);
    }
}
