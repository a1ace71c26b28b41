//! Fix suggestion database for cdkfetch errors.
//!
//! Provides actionable fix suggestions mapped to specific error types,
//! including commands, context explanations, and prevention tips.

// =============================================================================
// Fix Suggestion Types
// =============================================================================

/// A fix suggestion for an error.
#[derive(Debug, Clone)]
pub struct FixSuggestion {
    /// Primary fix commands in order of preference.
    /// These should be copy-paste ready for the terminal.
    pub commands: Vec<String>,

    /// Explanation of why this error occurred.
    pub context: String,

    /// Tips to prevent this error in the future.
    pub prevention: Option<String>,
}

impl FixSuggestion {
    /// Creates a new fix suggestion with required fields.
    #[must_use]
    pub fn new(commands: Vec<String>, context: impl Into<String>) -> Self {
        Self {
            commands,
            context: context.into(),
            prevention: None,
        }
    }

    /// Builder: adds prevention tips.
    #[must_use]
    pub fn with_prevention(mut self, prevention: impl Into<String>) -> Self {
        self.prevention = Some(prevention.into());
        self
    }
}

// =============================================================================
// Authentication
// =============================================================================

/// Suggestions when the interactive login could not be completed.
#[must_use]
pub fn session_failed_suggestions(provider: &str, stage: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec![
                "cdkfetch sessions list".to_string(),
                format!("cdkfetch acquire --provider {provider} -v"),
            ],
            format!(
                "Login for {provider} stopped while {stage}. The identity provider may have \
                 changed its pages or rejected the credentials."
            ),
        )
        .with_prevention("Check the screenshots directory for the captured page."),
    ]
}

// =============================================================================
// Network
// =============================================================================

/// Suggestions for request or run timeouts.
#[must_use]
pub fn timeout_suggestions(provider: &str, seconds: u64) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec![format!(
                "cdkfetch acquire --provider {provider} --timeout {}",
                seconds.saturating_mul(2)
            )],
            format!("The request to {provider} did not complete within {seconds}s."),
        )
        .with_prevention("Set general.timeout_seconds in config.toml for slow proxies."),
    ]
}

/// Suggestions for generic network failures.
#[must_use]
pub fn network_suggestions(message: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec!["cdkfetch acquire -v".to_string()],
        format!("Network error: {message}. Check your connection and proxy settings."),
    )]
}

// =============================================================================
// Configuration
// =============================================================================

/// Suggestions when an account lacks a provider credential.
#[must_use]
pub fn credential_missing_suggestions(
    account: &str,
    provider: &str,
    credential: &str,
) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec!["cdkfetch accounts list".to_string()],
            format!("Add `{credential}` to account \"{account}\" to use {provider}."),
        )
        .with_prevention("Restrict the account with a `providers` list if it should skip this provider."),
    ]
}

/// Suggestions when a config or accounts file cannot be parsed.
#[must_use]
pub fn config_parse_suggestions(path: &str, message: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![format!("$EDITOR {path}")],
        format!("The file could not be parsed: {message}"),
    )]
}

/// Suggestions for an unknown provider name.
#[must_use]
pub fn invalid_provider_suggestions(name: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec!["cdkfetch providers".to_string()],
        format!("\"{name}\" is not a known provider."),
    )]
}

/// Suggestions for an unknown account name.
#[must_use]
pub fn account_not_found_suggestions(account: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec!["cdkfetch accounts list".to_string()],
        format!("No account named \"{account}\" exists in the accounts file."),
    )]
}

/// Suggestions when the accounts file is empty or missing.
#[must_use]
pub fn no_accounts_suggestions(path: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec![format!("$EDITOR {path}")],
            "No accounts are configured.".to_string(),
        )
        .with_prevention("Point CDKFETCH_ACCOUNTS at an accounts file to override the default path."),
    ]
}

// =============================================================================
// Environment
// =============================================================================

/// Suggestions when the WebDriver endpoint cannot be reached.
#[must_use]
pub fn driver_unavailable_suggestions(url: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec!["geckodriver --port 4444".to_string()],
            format!("No WebDriver server answered at {url}."),
        )
        .with_prevention("Set browser.webdriver_url in config.toml to your driver address."),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_suggestion_doubles_timeout() {
        let suggestions = timeout_suggestions("x666", 30);
        assert!(suggestions[0].commands[0].contains("--timeout 60"));
    }

    #[test]
    fn driver_suggestion_mentions_url() {
        let suggestions = driver_unavailable_suggestions("http://localhost:4444");
        assert!(suggestions[0].context.contains("http://localhost:4444"));
        assert!(suggestions[0].prevention.is_some());
    }
}
