//! Session continuity for browser-driven providers.
//!
//! A cached session artifact is restored and probed first. Only when the
//! authenticated control is missing does the manager take the per-identity
//! lock, re-check the store, and run the delegated login and consent flow.
//! A freshly established session is persisted before the lock is released.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::browser::{Browser, Selector, query_first};
use super::models::AccountIdentity;
use super::provider::Provider;
use crate::error::{CdkError, Result};
use crate::storage::session_store::{SessionStore, StoredSession};

/// Phases of session establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Probing,
    Authenticating,
    Authorizing,
    Established,
    Failed,
}

impl SessionState {
    /// Stage label used in errors and screenshot names.
    #[must_use]
    pub const fn stage(self) -> &'static str {
        match self {
            Self::NoSession => "restoring",
            Self::Probing => "probing",
            Self::Authenticating => "authenticating",
            Self::Authorizing => "authorizing",
            Self::Established => "established",
            Self::Failed => "failed",
        }
    }
}

/// Identity-provider login page details.
#[derive(Debug, Clone)]
pub struct IdentityProviderPlan {
    /// URL fragment of the identity provider's login page.
    pub login_url_marker: String,
    pub username_field: Selector,
    pub password_field: Selector,
    pub submit: Selector,
    /// All fragments must appear in the URL for the consent page.
    pub consent_url_markers: Vec<String>,
    pub approve: Selector,
}

/// Waits between login steps.
#[derive(Debug, Clone, Copy)]
pub struct SessionTimings {
    /// After navigation, for challenge pages and client rendering.
    pub settle: Duration,
    /// After clicking an entry point or approve control.
    pub after_click: Duration,
    /// After submitting credentials.
    pub after_submit: Duration,
    /// How long to wait for the approve control.
    pub consent_timeout: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(5),
            after_click: Duration::from_secs(5),
            after_submit: Duration::from_secs(10),
            consent_timeout: Duration::from_secs(30),
        }
    }
}

/// How to recognise and establish a session on one site.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub provider: Provider,
    /// Page the reward action lives on.
    pub target_url: String,
    pub login_url: String,
    /// URL fragment meaning "not logged in".
    pub login_surface_marker: String,
    /// Control that only renders for authenticated users.
    pub affordance: Selector,
    /// Delegated-login links and buttons, tried in order.
    pub entry_points: Vec<Selector>,
    pub identity_provider: IdentityProviderPlan,
    pub timings: SessionTimings,
}

/// Result of a successful establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Established {
    /// A stored artifact was still valid.
    Reused,
    /// Another run logged in while this one waited for the lock.
    ReusedConcurrent,
    /// A fresh login ran and its artifact was persisted.
    Fresh,
}

/// Drives one browser through [`SessionState`] for one identity.
#[derive(Debug)]
pub struct SessionManager {
    store: Arc<SessionStore>,
    plan: SessionPlan,
    screenshot_dir: Option<PathBuf>,
    transitions: Vec<SessionState>,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<SessionStore>, plan: SessionPlan) -> Self {
        Self {
            store,
            plan,
            screenshot_dir: None,
            transitions: vec![SessionState::NoSession],
        }
    }

    /// Capture a screenshot here when establishment fails.
    #[must_use]
    pub fn with_screenshot_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.screenshot_dir = dir;
        self
    }

    /// States visited so far, starting with [`SessionState::NoSession`].
    #[must_use]
    pub fn transitions(&self) -> &[SessionState] {
        &self.transitions
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(SessionState::NoSession)
    }

    #[must_use]
    pub const fn plan(&self) -> &SessionPlan {
        &self.plan
    }

    fn enter(&mut self, state: SessionState) {
        tracing::debug!(provider = %self.plan.provider, state = state.stage(), "Session state");
        self.transitions.push(state);
    }

    /// Bring `browser` to an authenticated page for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`CdkError::SessionEstablishment`] when the login or consent
    /// flow does not reach the authenticated control. Never retried.
    pub async fn establish(
        &mut self,
        browser: &dyn Browser,
        identity: &AccountIdentity,
        username: &str,
        password: &str,
    ) -> Result<Established> {
        match self.run(browser, identity, username, password).await {
            Ok(established) => {
                self.enter(SessionState::Established);
                Ok(established)
            }
            Err(e) => {
                let stage = self.state().stage();
                self.capture_failure(browser, identity, stage).await;
                self.enter(SessionState::Failed);
                Err(match e {
                    CdkError::SessionEstablishment { .. } => e,
                    other => self.failure(stage, other.to_string()),
                })
            }
        }
    }

    async fn run(
        &mut self,
        browser: &dyn Browser,
        identity: &AccountIdentity,
        username: &str,
        password: &str,
    ) -> Result<Established> {
        let initial = self.store.load(identity)?;
        if let Some(stored) = &initial {
            tracing::info!(provider = %self.plan.provider, identity = %identity, "Restoring cached session");
            if let Err(e) = browser.restore_state(&stored.artifact()).await {
                tracing::warn!(error = %e, "Cached session could not be restored");
            }
        }

        self.enter(SessionState::Probing);
        if self.probe_target(browser).await? {
            tracing::info!(provider = %self.plan.provider, identity = %identity, "Cached session is valid");
            return Ok(Established::Reused);
        }

        let lock = self.store.lock_for(identity);
        let _guard = lock.lock().await;

        // Another run may have logged in while we waited.
        if let Some(current) = self.store.load(identity)?
            && !same_state(initial.as_ref(), &current)
        {
            tracing::info!(identity = %identity, "Session refreshed by a concurrent run; re-probing");
            browser.restore_state(&current.artifact()).await?;
            if self.probe_target(browser).await? {
                return Ok(Established::ReusedConcurrent);
            }
        }

        self.enter(SessionState::Authenticating);
        self.authenticate(browser, username, password).await?;

        let url = browser.current_url().await?;
        if self.is_consent_page(&url) {
            self.enter(SessionState::Authorizing);
            self.authorize(browser).await?;
        }

        browser.wait(self.plan.timings.settle).await;
        let url = browser.current_url().await?;
        if !url.starts_with(&self.plan.target_url) {
            browser.navigate(&self.plan.target_url).await?;
            browser.wait(self.plan.timings.settle).await;
        }
        if !self.probe(browser).await? {
            let url = browser.current_url().await.unwrap_or_default();
            return Err(self.failure(
                self.state().stage(),
                format!("authenticated control missing after login (at {url})"),
            ));
        }

        let artifact = browser.export_state().await?;
        self.store.save(identity, self.plan.provider, &artifact)?;
        tracing::info!(provider = %self.plan.provider, identity = %identity, "Session established and saved");
        Ok(Established::Fresh)
    }

    async fn probe_target(&self, browser: &dyn Browser) -> Result<bool> {
        browser.navigate(&self.plan.target_url).await?;
        browser.wait(self.plan.timings.settle).await;
        self.probe(browser).await
    }

    /// Whether the authenticated control is on the current page.
    async fn probe(&self, browser: &dyn Browser) -> Result<bool> {
        let url = browser.current_url().await?;
        if url.contains(&self.plan.login_surface_marker) {
            return Ok(false);
        }
        Ok(browser.query(&self.plan.affordance).await?.is_some())
    }

    async fn authenticate(&self, browser: &dyn Browser, username: &str, password: &str) -> Result<()> {
        let timings = self.plan.timings;
        let url = browser.current_url().await?;
        if !url.contains(&self.plan.login_surface_marker) {
            browser.navigate(&self.plan.login_url).await?;
            browser.wait(timings.settle).await;
        }

        let Some((selector, entry)) = query_first(browser, &self.plan.entry_points).await? else {
            return Err(self.failure(
                SessionState::Authenticating.stage(),
                "no delegated login entry point found".to_string(),
            ));
        };
        tracing::debug!(selector = %selector, "Opening delegated login");
        browser.click(&entry).await?;
        browser.wait(timings.after_click).await;

        let idp = &self.plan.identity_provider;
        let url = browser.current_url().await?;
        if url.contains(&idp.login_url_marker) {
            let (Some(user_field), Some(pass_field), Some(submit)) = (
                browser.query(&idp.username_field).await?,
                browser.query(&idp.password_field).await?,
                browser.query(&idp.submit).await?,
            ) else {
                return Err(self.failure(
                    SessionState::Authenticating.stage(),
                    "identity provider login form not found".to_string(),
                ));
            };
            browser.fill(&user_field, username).await?;
            browser.fill(&pass_field, password).await?;
            browser.click(&submit).await?;
            browser.wait(timings.after_submit).await;
        }
        Ok(())
    }

    async fn authorize(&self, browser: &dyn Browser) -> Result<()> {
        let idp = &self.plan.identity_provider;
        let Some(approve) = browser
            .wait_for(&idp.approve, self.plan.timings.consent_timeout)
            .await?
        else {
            return Err(self.failure(
                SessionState::Authorizing.stage(),
                "approve control not found on consent page".to_string(),
            ));
        };
        browser.click(&approve).await?;
        browser.wait(self.plan.timings.after_click).await;
        Ok(())
    }

    fn is_consent_page(&self, url: &str) -> bool {
        let markers = &self.plan.identity_provider.consent_url_markers;
        !markers.is_empty() && markers.iter().all(|m| url.contains(m.as_str()))
    }

    fn failure(&self, stage: &str, reason: String) -> CdkError {
        CdkError::SessionEstablishment {
            provider: self.plan.provider.cli_name().to_string(),
            stage: stage.to_string(),
            reason,
        }
    }

    /// Best-effort debug screenshot.
    async fn capture_failure(&self, browser: &dyn Browser, identity: &AccountIdentity, stage: &str) {
        let Some(dir) = &self.screenshot_dir else {
            return;
        };
        let bytes = match browser.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "Screenshot failed");
                return;
            }
        };
        let name = format!(
            "{}_{}_{}_{}.png",
            self.plan.provider.cli_name(),
            identity,
            stage,
            Utc::now().format("%Y%m%d%H%M%S")
        );
        let path = dir.join(name);
        let written = std::fs::create_dir_all(dir).and_then(|()| std::fs::write(&path, bytes));
        match written {
            Ok(()) => tracing::info!(path = %path.display(), "Saved failure screenshot"),
            Err(e) => tracing::debug!(error = %e, "Could not write screenshot"),
        }
    }
}

fn same_state(initial: Option<&StoredSession>, current: &StoredSession) -> bool {
    initial.is_some_and(|i| i.state == current.state && i.saved_at == current.saved_at)
}
