//! Provider descriptors and the reward flow seam.
//!
//! [`Provider`] names the supported reward platforms; [`RewardFlow`] is the
//! per-provider implementation the spin loop drives.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::classify::{self, ResponseProfile};
use super::models::{Classification, RawOutcome, Step};
use crate::error::{CdkError, Result};

// =============================================================================
// Provider Enum
// =============================================================================

/// Supported reward platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    RunawaytimeCheckin,
    RunawaytimeWheel,
    X666,
    B4u,
}

/// Kind of credential a provider needs from the account entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    CookieJar,
    BearerToken,
    UsernamePassword,
}

impl CredentialKind {
    /// Accounts-file field that carries this credential.
    #[must_use]
    pub const fn account_field(self) -> &'static str {
        match self {
            Self::CookieJar => "fuli_cookies",
            Self::BearerToken => "access_token",
            Self::UsernamePassword => "linux_do",
        }
    }
}

impl Provider {
    /// All providers in display order.
    pub const ALL: &'static [Self] = &[
        Self::RunawaytimeCheckin,
        Self::RunawaytimeWheel,
        Self::X666,
        Self::B4u,
    ];

    /// CLI name for this provider.
    #[must_use]
    pub const fn cli_name(self) -> &'static str {
        match self {
            Self::RunawaytimeCheckin => "runawaytime-checkin",
            Self::RunawaytimeWheel => "runawaytime-wheel",
            Self::X666 => "x666",
            Self::B4u => "b4u",
        }
    }

    /// Display name for human output.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::RunawaytimeCheckin => "Runawaytime check-in",
            Self::RunawaytimeWheel => "Runawaytime wheel",
            Self::X666 => "x666 lottery",
            Self::B4u => "b4u lucky draw",
        }
    }

    /// Parse from CLI argument.
    pub fn from_cli_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|p| p.cli_name() == lower)
            .copied()
            .ok_or_else(|| CdkError::InvalidProvider(name.to_string()))
    }

    /// Base URL used unless overridden in config.
    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::RunawaytimeCheckin | Self::RunawaytimeWheel => "https://fuli.hxi.me",
            Self::X666 => "https://qd.x666.me",
            Self::B4u => "https://tw.b4u.qzz.io",
        }
    }

    /// Credential the account must supply.
    #[must_use]
    pub const fn credential_kind(self) -> CredentialKind {
        match self {
            Self::RunawaytimeCheckin | Self::RunawaytimeWheel => CredentialKind::CookieJar,
            Self::X666 => CredentialKind::BearerToken,
            Self::B4u => CredentialKind::UsernamePassword,
        }
    }

    /// Whether this provider is driven through a browser session.
    #[must_use]
    pub const fn requires_browser(self) -> bool {
        matches!(self, Self::B4u)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

// =============================================================================
// Provider Selection
// =============================================================================

/// Provider selection from CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderSelection {
    /// Single provider.
    Single(Provider),
    /// All enabled providers.
    #[default]
    All,
    /// Custom list of providers.
    Custom(Vec<Provider>),
}

impl ProviderSelection {
    /// Parse from a CLI argument: `all`, one name, or a comma separated list.
    pub fn from_arg(arg: &str) -> Result<Self> {
        let lower = arg.trim().to_lowercase();
        if lower == "all" {
            return Ok(Self::All);
        }
        let names: Vec<&str> = lower.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        match names.as_slice() {
            [] => Err(CdkError::InvalidProvider(arg.to_string())),
            [one] => Ok(Self::Single(Provider::from_cli_name(one)?)),
            many => many
                .iter()
                .map(|n| Provider::from_cli_name(n))
                .collect::<Result<Vec<_>>>()
                .map(Self::Custom),
        }
    }

    /// Get the providers in this selection.
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        match self {
            Self::Single(p) => vec![*p],
            Self::All => Provider::ALL.to_vec(),
            Self::Custom(ps) => ps.clone(),
        }
    }
}

// =============================================================================
// Reward Flow
// =============================================================================

/// What a status query said about the allowance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowanceReading {
    /// The provider stated how many actions remain.
    Remaining(u32),
    /// The reward was already taken; the provider may repeat the code it issued.
    Exhausted { existing_code: Option<String> },
    /// No usable count; the flow's assumed allowance applies.
    Unobservable,
}

/// One provider's reward procedure, driven by the spin loop.
///
/// Implementations perform steps and interpret provider-specific state. They
/// never decide when to stop; the loop does.
#[async_trait]
pub trait RewardFlow: Send {
    /// Provider this flow belongs to.
    fn provider(&self) -> Provider;

    /// Field locations for response classification.
    fn profile(&self) -> &ResponseProfile {
        &ResponseProfile::STANDARD
    }

    /// Whether [`Step::QueryStatus`] is meaningful for this provider.
    fn supports_status_query(&self) -> bool {
        true
    }

    /// Allowance used when the count cannot be observed.
    fn assumed_allowance(&self) -> u32 {
        1
    }

    /// Whether codes are collected from a history view after the loop.
    fn delivers_out_of_band(&self) -> bool {
        false
    }

    /// Run one step and return what the provider answered.
    async fn perform(&mut self, step: Step) -> Result<RawOutcome>;

    /// Interpret a status query outcome.
    fn read_allowance(&self, outcome: &RawOutcome) -> AllowanceReading;

    /// Classify an action outcome.
    fn classify(&self, outcome: &RawOutcome) -> Classification {
        classify::classify(outcome, self.profile())
    }

    /// Remaining count reported alongside an action outcome.
    fn reported_remaining(&self, outcome: &RawOutcome) -> Option<u32> {
        classify::reported_remaining(outcome, self.profile())
    }

    /// Collect today's codes from the history view.
    async fn harvest(&mut self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
