//! Browser automation seam.
//!
//! The session manager, the b4u flow and the history extractor only see the
//! [`Browser`] trait. [`WebDriverBrowser`](super::webdriver::WebDriverBrowser)
//! is the production implementation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use super::models::SessionArtifact;
use crate::error::Result;

/// Polling interval for [`Browser::wait_for`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A CSS selector, optionally narrowed to elements whose visible text
/// contains `text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    pub css: String,
    pub text: Option<String>,
}

impl Selector {
    #[must_use]
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: None,
        }
    }

    #[must_use]
    pub fn with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: Some(text.into()),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => write!(f, "{}:has-text(\"{text}\")", self.css),
            None => f.write_str(&self.css),
        }
    }
}

/// Opaque reference to an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Page-level automation primitives.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// First element matching `selector`, if any.
    async fn query(&self, selector: &Selector) -> Result<Option<ElementHandle>>;

    async fn click(&self, element: &ElementHandle) -> Result<()>;

    /// Clear a field and type `value` into it.
    async fn fill(&self, element: &ElementHandle, value: &str) -> Result<()>;

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>>;

    /// Run a script in the page and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Visible text of the whole page.
    async fn page_text(&self) -> Result<String>;

    /// PNG bytes of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Serialize the authentication state of the current origin.
    async fn export_state(&self) -> Result<SessionArtifact>;

    /// Load a previously exported state.
    async fn restore_state(&self, artifact: &SessionArtifact) -> Result<()>;

    /// End the browser session.
    async fn close(&self) -> Result<()>;

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Poll for `selector` until it appears or `timeout` elapses.
    async fn wait_for(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.query(selector).await? {
                return Ok(Some(element));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            self.wait(POLL_INTERVAL).await;
        }
    }
}

/// Opens browser sessions.
#[async_trait]
pub trait BrowserFactory: Send + Sync {
    /// Start a fresh browser session, optionally behind `proxy`.
    async fn launch(&self, proxy: Option<&str>) -> Result<Arc<dyn Browser>>;
}

/// First selector in `candidates` that matches, with the element found.
pub async fn query_first(
    browser: &dyn Browser,
    candidates: &[Selector],
) -> Result<Option<(Selector, ElementHandle)>> {
    for selector in candidates {
        if let Some(element) = browser.query(selector).await? {
            return Ok(Some((selector.clone(), element)));
        }
    }
    Ok(None)
}

/// Whether an element lacks the `disabled` attribute.
pub async fn is_enabled(browser: &dyn Browser, element: &ElementHandle) -> Result<bool> {
    Ok(browser
        .attribute(element, "disabled")
        .await?
        .is_none_or(|v| v == "false"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_display() {
        assert_eq!(Selector::css("#login-button").to_string(), "#login-button");
        assert_eq!(
            Selector::with_text("button", "开始抽奖").to_string(),
            "button:has-text(\"开始抽奖\")"
        );
    }
}
