//! Core data models for reward acquisition.
//!
//! These types are shared by the classifier, the spin loop, the session
//! manager and the renderers. JSON-facing types use `camelCase` like the rest
//! of the robot output.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::document::Document;

// =============================================================================
// Steps and raw outcomes
// =============================================================================

/// One provider-defined step the action executor can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// Ask the provider how many reward actions remain.
    QueryStatus,
    /// Perform one reward action (check-in, spin, draw).
    PerformAction,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueryStatus => write!(f, "query-status"),
            Self::PerformAction => write!(f, "perform-action"),
        }
    }
}

/// What a provider step produced, before any business interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutcome {
    /// Timeout, connection error, or a body that could not be parsed.
    Transport { reason: String },
    /// An HTTP response with a JSON body.
    Http { status: u16, body: Document },
    /// Visible text of a page after a browser action.
    Page {
        text: String,
        /// Whether the reward control was present and enabled.
        control_available: bool,
    },
}

impl RawOutcome {
    /// Build an outcome from an HTTP status and raw body text.
    ///
    /// Non-JSON bodies become transport failures.
    #[must_use]
    pub fn from_http(status: u16, body: &str) -> Self {
        match Document::parse(body) {
            Ok(body) => Self::Http { status, body },
            Err(e) => Self::Transport {
                reason: format!("HTTP {status} with unparseable body: {e}"),
            },
        }
    }

    /// Build a transport failure.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Short description for attempt records and logs.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Transport { reason } => format!("transport: {reason}"),
            Self::Http { status, .. } => format!("HTTP {status}"),
            Self::Page {
                control_available, ..
            } => {
                if *control_available {
                    "page".to_string()
                } else {
                    "page (control unavailable)".to_string()
                }
            }
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Exactly one of these is produced per acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Classification {
    /// The action succeeded. `code` is `None` only for out-of-band providers
    /// whose action consumed an allowance without showing a code.
    Success { code: Option<String> },
    /// The reward was already taken for the current period.
    AlreadyDone,
    /// The provider reports zero remaining actions.
    NoneRemaining,
    /// Worth retrying the same step.
    TransientFailure { reason: String },
    /// Stop the loop.
    FatalFailure { reason: String },
}

impl Classification {
    /// Successful classification carrying a code.
    #[must_use]
    pub fn success(code: impl Into<String>) -> Self {
        Self::Success {
            code: Some(code.into()),
        }
    }

    /// Short label used in logs and attempt records.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::AlreadyDone => "already-done",
            Self::NoneRemaining => "none-remaining",
            Self::TransientFailure { .. } => "transient-failure",
            Self::FatalFailure { .. } => "fatal-failure",
        }
    }
}

// =============================================================================
// Collected codes
// =============================================================================

/// Distinct codes in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CdkResult {
    codes: Vec<String>,
}

impl CdkResult {
    /// Empty result.
    #[must_use]
    pub const fn new() -> Self {
        Self { codes: Vec::new() }
    }

    /// Append a code unless it is already present or blank.
    ///
    /// Returns whether the code was added.
    pub fn push(&mut self, code: impl Into<String>) -> bool {
        let code = code.into().trim().to_string();
        if code.is_empty() || self.contains(&code) {
            return false;
        }
        self.codes.push(code);
        true
    }

    /// Append several codes, keeping first-seen order.
    pub fn extend<I, S>(&mut self, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for code in codes {
            self.push(code);
        }
    }

    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.codes
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.codes
    }
}

impl<S: Into<String>> FromIterator<S> for CdkResult {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut result = Self::new();
        result.extend(iter);
        result
    }
}

// =============================================================================
// Allowance
// =============================================================================

/// Where the remaining count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllowanceSource {
    /// The provider stated it.
    Reported,
    /// Nothing was observable; a configured default was used.
    Assumed,
}

/// Number of reward actions left in the current period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardAllowance {
    pub remaining: u32,
    pub source: AllowanceSource,
}

impl RewardAllowance {
    #[must_use]
    pub const fn reported(remaining: u32) -> Self {
        Self {
            remaining,
            source: AllowanceSource::Reported,
        }
    }

    #[must_use]
    pub const fn assumed(remaining: u32) -> Self {
        Self {
            remaining,
            source: AllowanceSource::Assumed,
        }
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Allowance after one successful action.
    ///
    /// A reported value is honoured only when it does not exceed the local
    /// decrement, so the count strictly decreases within a run.
    #[must_use]
    pub fn after_success(self, reported: Option<u32>) -> Self {
        let decremented = self.remaining.saturating_sub(1);
        match reported {
            Some(value) => Self::reported(value.min(decremented)),
            None => Self {
                remaining: decremented,
                source: self.source,
            },
        }
    }
}

/// One action executor invocation as seen by the spin loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionAttempt {
    /// 1-based ordinal within the run.
    pub index: u32,
    pub step: Step,
    pub outcome: String,
    pub classification: Classification,
}

// =============================================================================
// Accounts and credentials
// =============================================================================

/// Stable key for one account across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountIdentity(String);

impl AccountIdentity {
    /// Length of the hex prefix kept from the digest.
    pub const HASH_LEN: usize = 8;

    /// Derive an identity from a login name (SHA-256, truncated hex).
    #[must_use]
    pub fn from_login(login: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(login.as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..Self::HASH_LEN].to_string())
    }

    /// Use an already derived key as-is.
    #[must_use]
    pub fn from_key(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Credential kinds a provider may require.
#[derive(Clone, PartialEq, Eq)]
pub enum ProviderCredentials {
    CookieJar(BTreeMap<String, String>),
    BearerToken(String),
    UsernamePassword { username: String, password: String },
}

impl ProviderCredentials {
    /// Name of the variant, for messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CookieJar(_) => "cookie-jar",
            Self::BearerToken(_) => "bearer-token",
            Self::UsernamePassword { .. } => "username-password",
        }
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CookieJar(jar) => f
                .debug_struct("CookieJar")
                .field("names", &jar.keys().collect::<Vec<_>>())
                .finish_non_exhaustive(),
            Self::BearerToken(_) => f.write_str("BearerToken(<redacted>)"),
            Self::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Opaque serialized browser session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionArtifact(String);

impl SessionArtifact {
    #[must_use]
    pub fn new(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

// =============================================================================
// Per-run report
// =============================================================================

/// Why a loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DoneReason {
    /// The allowance reached zero after successful actions.
    AllowanceExhausted,
    /// The provider said the reward was already taken.
    AlreadyDone,
    /// The provider said nothing remains.
    NoneRemaining,
}

impl fmt::Display for DoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllowanceExhausted => write!(f, "allowance exhausted"),
            Self::AlreadyDone => write!(f, "already done"),
            Self::NoneRemaining => write!(f, "none remaining"),
        }
    }
}

/// How one account+provider run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Termination {
    /// Finished normally, possibly with zero codes.
    Done { reason: DoneReason },
    /// Broke partway; collected codes are kept.
    Aborted { reason: String },
    /// Configuration or session failure before or outside the loop.
    Failed { error: String, code: String },
    /// The overall deadline elapsed.
    TimedOut { seconds: u64 },
}

impl Termination {
    /// Whether the run ended without any problem.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    /// One-line description for human output.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Done { reason } => format!("done ({reason})"),
            Self::Aborted { reason } => format!("aborted: {reason}"),
            Self::Failed { error, code } => format!("failed [{code}]: {error}"),
            Self::TimedOut { seconds } => format!("timed out after {seconds}s"),
        }
    }
}

/// Result of one account+provider run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionReport {
    pub account: String,
    pub identity: AccountIdentity,
    pub provider: String,
    pub codes: CdkResult,
    pub termination: Termination,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

// =============================================================================
// Listing payloads
// =============================================================================

/// One configured account as shown by `accounts list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub name: String,
    pub identity: AccountIdentity,
    pub has_proxy: bool,
    /// Providers this account has credentials for and is allowed to run.
    pub runnable: Vec<String>,
    /// Allowed providers whose credential is absent.
    pub missing: Vec<String>,
}

/// One supported provider as shown by `providers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub name: String,
    pub display_name: String,
    pub base_url: String,
    pub credential: String,
    pub browser: bool,
    pub enabled: bool,
}

/// One cached browser session as shown by `sessions list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub identity: AccountIdentity,
    /// Account owning the identity, when it is still configured.
    pub account: Option<String>,
    pub provider: String,
    pub saved_at: DateTime<Utc>,
}

// =============================================================================
// Robot output
// =============================================================================

/// Envelope for machine-readable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotOutput<T> {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub data: T,

    #[serde(default)]
    pub errors: Vec<String>,
}

impl<T> RobotOutput<T> {
    /// Schema identifier written into every envelope.
    pub const SCHEMA_VERSION: &'static str = "cdkfetch.v1";

    /// Create a new robot output envelope.
    pub fn new(command: impl Into<String>, data: T) -> Self {
        Self::with_errors(command, data, Vec::new())
    }

    /// Create with errors.
    pub fn with_errors(command: impl Into<String>, data: T, errors: Vec<String>) -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            command: command.into(),
            data,
            errors,
        }
    }
}
