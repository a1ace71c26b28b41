//! Account configuration.
//!
//! The accounts file is a JSON list. Each entry names an account and carries
//! the credentials for whichever providers it takes part in:
//!
//! ```json
//! [
//!   {
//!     "name": "main",
//!     "proxy": "http://127.0.0.1:7890",
//!     "providers": ["x666", "b4u"],
//!     "fuli_cookies": { "session": "..." },
//!     "access_token": "...",
//!     "linux_do": { "username": "...", "password": "..." }
//!   }
//! ]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::models::{AccountIdentity, ProviderCredentials};
use crate::core::provider::{CredentialKind, Provider};
use crate::error::{CdkError, Result};

/// Delegated-login credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// One configured account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Restrict the account to these providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuli_cookies: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_do: Option<LoginCredentials>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("proxy", &self.proxy)
            .field("providers", &self.providers)
            .field("linux_do", &self.linux_do)
            .finish_non_exhaustive()
    }
}

impl Account {
    /// Identity key, derived from the delegated-login username when present.
    #[must_use]
    pub fn identity(&self) -> AccountIdentity {
        match &self.linux_do {
            Some(login) if !login.username.trim().is_empty() => {
                AccountIdentity::from_login(&login.username)
            }
            _ => AccountIdentity::from_login(&self.name),
        }
    }

    /// Whether the account's provider filter admits `provider`.
    #[must_use]
    pub fn allows(&self, provider: Provider) -> bool {
        self.providers.as_ref().is_none_or(|names| {
            names
                .iter()
                .any(|n| n.trim().eq_ignore_ascii_case(provider.cli_name()))
        })
    }

    /// Whether the account carries the credential `provider` needs.
    #[must_use]
    pub fn has_credentials_for(&self, provider: Provider) -> bool {
        self.credentials_for(provider).is_ok()
    }

    /// Credentials for one provider.
    ///
    /// # Errors
    ///
    /// Returns [`CdkError::CredentialMissing`] when the field is absent or empty.
    pub fn credentials_for(&self, provider: Provider) -> Result<ProviderCredentials> {
        let kind = provider.credential_kind();
        let credentials = match kind {
            CredentialKind::CookieJar => self
                .fuli_cookies
                .as_ref()
                .filter(|jar| !jar.is_empty())
                .map(|jar| ProviderCredentials::CookieJar(jar.clone())),
            CredentialKind::BearerToken => self
                .access_token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| ProviderCredentials::BearerToken(t.to_string())),
            CredentialKind::UsernamePassword => self
                .linux_do
                .as_ref()
                .filter(|l| !l.username.trim().is_empty() && !l.password.is_empty())
                .map(|l| ProviderCredentials::UsernamePassword {
                    username: l.username.clone(),
                    password: l.password.clone(),
                }),
        };
        credentials.ok_or_else(|| CdkError::CredentialMissing {
            account: self.name.clone(),
            provider: provider.cli_name().to_string(),
            credential: kind.account_field().to_string(),
        })
    }

    /// Proxy for this account, falling back to `default`.
    #[must_use]
    pub fn effective_proxy<'a>(&'a self, default: Option<&'a str>) -> Option<&'a str> {
        self.proxy
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or(default)
    }
}

/// Accounts loaded from the accounts file.
#[derive(Debug, Clone)]
pub struct AccountStore {
    accounts: Vec<Account>,
    path: PathBuf,
}

impl AccountStore {
    /// Load accounts from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`CdkError::NoAccountsConfigured`] when the file is missing or
    /// lists no accounts, and [`CdkError::ConfigParse`] when it is not valid.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CdkError::NoAccountsConfigured(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Err(CdkError::NoAccountsConfigured(path.display().to_string()));
        }

        let accounts: Vec<Account> =
            serde_json::from_str(&content).map_err(|e| CdkError::ConfigParse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        if accounts.is_empty() {
            return Err(CdkError::NoAccountsConfigured(path.display().to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for account in &accounts {
            if account.name.trim().is_empty() {
                return Err(CdkError::ConfigParse {
                    path: path.display().to_string(),
                    message: "account name must not be empty".to_string(),
                });
            }
            if !seen.insert(account.name.as_str()) {
                return Err(CdkError::ConfigParse {
                    path: path.display().to_string(),
                    message: format!("duplicate account name \"{}\"", account.name),
                });
            }
        }

        tracing::debug!(path = %path.display(), count = accounts.len(), "Loaded accounts");
        Ok(Self {
            accounts,
            path: path.to_path_buf(),
        })
    }

    /// Build a store from accounts already in memory.
    #[must_use]
    pub fn from_accounts(accounts: Vec<Account>) -> Self {
        Self {
            accounts,
            path: PathBuf::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Look up an account by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`CdkError::AccountNotFound`] when no account matches.
    pub fn find(&self, name: &str) -> Result<&Account> {
        self.accounts
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| CdkError::AccountNotFound(name.to_string()))
    }

    /// Accounts to run: one by name, or all of them.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<&Account>> {
        match name {
            Some(name) => Ok(vec![self.find(name)?]),
            None => Ok(self.accounts.iter().collect()),
        }
    }
}
