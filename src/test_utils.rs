//! Test utilities for cdkfetch.
//!
//! Provides scripted collaborators (an HTTP transport and an in-memory lucky
//! draw site with its browser), data factories, and assertion macros for use
//! across all test modules.
//!
//! # Usage
//!
//! ```rust,ignore
//! use cdkfetch::test_utils::*;
//!
//! let transport = ScriptedTransport::new();
//! transport.push_json(200, serde_json::json!({"remaining": 1}));
//!
//! let site = FakeLuckyDrawSite::new();
//! site.set_remaining(2, true);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use serde_json::{Value, json};

use crate::cli::args::Cli;
use crate::core::browser::{Browser, BrowserFactory, ElementHandle, Selector};
use crate::core::history::BUSINESS_OFFSET;
use crate::core::http::{HttpRequest, HttpResponse, Transport};
use crate::core::models::SessionArtifact;
use crate::error::{CdkError, Result};
use crate::storage::{Account, AppPaths, Config, ResolvedConfig};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// =============================================================================
// Factories
// =============================================================================

/// Account with a name and no credentials.
#[must_use]
pub fn make_account(name: &str) -> Account {
    Account {
        name: name.to_string(),
        proxy: None,
        providers: None,
        fuli_cookies: None,
        access_token: None,
        linux_do: None,
    }
}

/// Default configuration with all paths under `dir` and no environment.
///
/// # Panics
///
/// Panics if the default configuration does not resolve.
#[must_use]
pub fn resolved_config(dir: &Path) -> ResolvedConfig {
    let cli = Cli::parse_from(["cdkfetch"]);
    ResolvedConfig::resolve_from(
        &cli,
        None,
        Config::default(),
        &AppPaths::under(dir),
        &|_| None,
    )
    .expect("default config resolves")
}

/// A history timestamp on the current business day.
#[must_use]
pub fn today_stamp() -> String {
    Utc::now()
        .with_timezone(&BUSINESS_OFFSET)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Sample accounts file with one account per credential kind.
#[must_use]
pub fn make_test_accounts_json() -> String {
    r#"[
  {"name": "cookies", "fuli_cookies": {"session": "abc"}},
  {"name": "token", "access_token": "tok", "proxy": "http://127.0.0.1:8080"},
  {"name": "oauth", "linux_do": {"username": "alice", "password": "pw"}, "providers": ["b4u"]}
]"#
    .to_string()
}

// =============================================================================
// Scripted HTTP transport
// =============================================================================

enum Scripted {
    Respond(HttpResponse),
    Pending,
}

/// Transport that answers from a queue and records every request.
///
/// An empty queue answers with a network error.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON response.
    pub fn push_json(&self, status: u16, body: Value) {
        self.push_raw(status, body.to_string());
    }

    /// Queue a response with an arbitrary body.
    pub fn push_raw(&self, status: u16, body: impl Into<String>) {
        locked(&self.script).push_back(Scripted::Respond(HttpResponse {
            status,
            body: body.into(),
        }));
    }

    /// Queue a request that never completes.
    pub fn push_pending(&self) {
        locked(&self.script).push_back(Scripted::Pending);
    }

    /// Requests sent so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        locked(&self.requests).clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        locked(&self.requests).push(request);
        let next = locked(&self.script).pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Pending) => std::future::pending().await,
            None => Err(CdkError::Network("no scripted response".to_string())),
        }
    }
}

// =============================================================================
// Fake lucky draw site
// =============================================================================

const SITE_BASE: &str = "https://draw.example.test";
const IDP_LOGIN_URL: &str = "https://linux.do/login";
const CONSENT_URL: &str = "https://connect.linux.do/oauth2/authorize?client_id=draw";
const USERNAME: &str = "alice";
const PASSWORD: &str = "correct-horse";

#[derive(Default)]
struct SiteState {
    remaining: u32,
    count_visible: bool,
    spin_results: VecDeque<String>,
    history: Vec<(String, String)>,
    tokens: HashSet<String>,
    issued: u32,
    logins: u32,
    open_browsers: u32,
    require_consent: bool,
}

/// In-memory lucky draw site with a delegated login.
///
/// Unauthenticated visits to the draw page land on `/login`. Its login link
/// leads to the identity provider form, optionally through a consent page,
/// and back to the draw page with a fresh session token.
#[derive(Clone)]
pub struct FakeLuckyDrawSite {
    state: Arc<Mutex<SiteState>>,
}

impl Default for FakeLuckyDrawSite {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLuckyDrawSite {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SiteState {
                count_visible: true,
                ..SiteState::default()
            })),
        }
    }

    #[must_use]
    pub const fn base_url(&self) -> &str {
        SITE_BASE
    }

    #[must_use]
    pub const fn username(&self) -> &str {
        USERNAME
    }

    #[must_use]
    pub const fn password(&self) -> &str {
        PASSWORD
    }

    /// Draws left today, and whether the page states the count.
    pub fn set_remaining(&self, remaining: u32, count_visible: bool) {
        let mut state = locked(&self.state);
        state.remaining = remaining;
        state.count_visible = count_visible;
    }

    /// Dialog text for the next draw. Unscripted draws show "谢谢参与".
    pub fn push_spin_result(&self, text: impl Into<String>) {
        locked(&self.state).spin_results.push_back(text.into());
    }

    /// Row for the `/my-codes` listing.
    pub fn add_history_row(&self, code: String, stamp: impl Into<String>) {
        locked(&self.state).history.push((code, stamp.into()));
    }

    /// Route logins through the consent page.
    pub fn require_consent(&self, required: bool) {
        locked(&self.state).require_consent = required;
    }

    /// Forget every issued session token.
    pub fn expire_sessions(&self) {
        locked(&self.state).tokens.clear();
    }

    /// Completed logins so far.
    #[must_use]
    pub fn login_count(&self) -> u32 {
        locked(&self.state).logins
    }

    /// Browsers launched and not yet closed.
    #[must_use]
    pub fn open_browsers(&self) -> u32 {
        locked(&self.state).open_browsers
    }

    /// A browser on this site. Not counted as open.
    #[must_use]
    pub fn browser(&self) -> FakeBrowser {
        FakeBrowser {
            site: Arc::clone(&self.state),
            page: Mutex::new(PageState::default()),
        }
    }

    /// Factory whose browsers are counted by [`Self::open_browsers`].
    #[must_use]
    pub fn factory(&self) -> FakeBrowserFactory {
        FakeBrowserFactory { site: self.clone() }
    }
}

/// Launches [`FakeBrowser`]s on one site.
pub struct FakeBrowserFactory {
    site: FakeLuckyDrawSite,
}

#[async_trait]
impl BrowserFactory for FakeBrowserFactory {
    async fn launch(&self, _proxy: Option<&str>) -> Result<Arc<dyn Browser>> {
        locked(&self.site.state).open_browsers += 1;
        Ok(Arc::new(self.site.browser()))
    }
}

#[derive(Default)]
struct PageState {
    url: String,
    token: Option<String>,
    dialog: Option<String>,
    fields: HashMap<String, String>,
    closed: bool,
}

/// Browser over a [`FakeLuckyDrawSite`].
pub struct FakeBrowser {
    site: Arc<Mutex<SiteState>>,
    page: Mutex<PageState>,
}

impl FakeBrowser {
    /// Log in without going through the pages.
    pub fn authenticate(&self) {
        let token = issue_token(&mut locked(&self.site));
        locked(&self.page).token = Some(token);
    }

    fn authenticated(&self, page: &PageState) -> bool {
        page.token
            .as_ref()
            .is_some_and(|t| locked(&self.site).tokens.contains(t))
    }

    fn path(url: &str) -> Option<&str> {
        url.strip_prefix(SITE_BASE)
            .map(|rest| rest.split('?').next().unwrap_or(rest))
    }

    /// Element ids present on the current page.
    fn elements(&self, page: &PageState) -> Vec<(&'static str, Selector)> {
        match Self::path(&page.url) {
            Some("/login") => vec![("linuxdo-link", Selector::css(r#"a[href*="linuxdo"]"#))],
            Some("/luckydraw") => {
                let mut elements = vec![(
                    "spin-button",
                    Selector::with_text("button", "开始抽奖"),
                )];
                if page.dialog.is_some() {
                    elements.push(("dialog-close", Selector::with_text("button", "确定")));
                }
                elements
            }
            _ if page.url.starts_with(IDP_LOGIN_URL) => vec![
                ("username", Selector::css("#login-account-name")),
                ("password", Selector::css("#login-account-password")),
                ("login-submit", Selector::css("#login-button")),
            ],
            _ if page.url.starts_with(CONSENT_URL) => {
                vec![("approve", Selector::css(r#"a[href^="/oauth2/approve"]"#))]
            }
            _ => Vec::new(),
        }
    }

    fn complete_login(&self, page: &mut PageState) {
        let mut site = locked(&self.site);
        site.logins += 1;
        page.token = Some(issue_token(&mut site));
        page.url = format!("{SITE_BASE}/luckydraw");
    }

    fn ensure_open(page: &PageState) -> Result<()> {
        if page.closed {
            Err(CdkError::Browser("browser session closed".to_string()))
        } else {
            Ok(())
        }
    }
}

fn issue_token(site: &mut SiteState) -> String {
    site.issued += 1;
    let token = format!("token-{}", site.issued);
    site.tokens.insert(token.clone());
    token
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut page = locked(&self.page);
        Self::ensure_open(&page)?;
        page.dialog = None;
        page.url = url.to_string();
        let protected = matches!(Self::path(url), Some("/luckydraw" | "/my-codes"));
        if protected && !self.authenticated(&page) {
            page.url = format!("{SITE_BASE}/login");
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let page = locked(&self.page);
        Self::ensure_open(&page)?;
        Ok(page.url.clone())
    }

    async fn query(&self, selector: &Selector) -> Result<Option<ElementHandle>> {
        let page = locked(&self.page);
        Self::ensure_open(&page)?;
        Ok(self
            .elements(&page)
            .into_iter()
            .find(|(_, s)| s == selector)
            .map(|(id, _)| ElementHandle::new(id)))
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let mut page = locked(&self.page);
        Self::ensure_open(&page)?;
        match element.id() {
            "linuxdo-link" => page.url = IDP_LOGIN_URL.to_string(),
            "login-submit" => {
                let valid = page.fields.get("username").map(String::as_str) == Some(USERNAME)
                    && page.fields.get("password").map(String::as_str) == Some(PASSWORD);
                if valid {
                    if locked(&self.site).require_consent {
                        page.url = CONSENT_URL.to_string();
                    } else {
                        self.complete_login(&mut page);
                    }
                }
            }
            "approve" => self.complete_login(&mut page),
            "spin-button" => {
                let mut site = locked(&self.site);
                if site.remaining > 0 {
                    site.remaining -= 1;
                    let result = site
                        .spin_results
                        .pop_front()
                        .unwrap_or_else(|| "谢谢参与".to_string());
                    page.dialog = Some(result);
                }
            }
            "dialog-close" => page.dialog = None,
            other => return Err(CdkError::Browser(format!("unknown element {other}"))),
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> Result<()> {
        let mut page = locked(&self.page);
        Self::ensure_open(&page)?;
        page.fields
            .insert(element.id().to_string(), value.to_string());
        Ok(())
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let disabled =
            element.id() == "spin-button" && name == "disabled" && locked(&self.site).remaining == 0;
        Ok(disabled.then(|| "true".to_string()))
    }

    async fn evaluate(&self, _script: &str) -> Result<Value> {
        let page = locked(&self.page);
        Self::ensure_open(&page)?;
        if Self::path(&page.url) != Some("/my-codes") {
            return Ok(json!([]));
        }
        let rows: Vec<Value> = locked(&self.site)
            .history
            .iter()
            .map(|(code, stamp)| json!([code, "LinuxDo", "已发放", stamp]))
            .collect();
        Ok(Value::Array(rows))
    }

    async fn page_text(&self) -> Result<String> {
        let page = locked(&self.page);
        Self::ensure_open(&page)?;
        let text = match Self::path(&page.url) {
            Some("/luckydraw") => {
                let site = locked(&self.site);
                let mut text = String::from("幸运大转盘\n");
                if site.count_visible {
                    text.push_str(&format!("今日剩余次数：{}\n", site.remaining));
                }
                if let Some(dialog) = &page.dialog {
                    text.push_str(dialog);
                    text.push('\n');
                }
                text
            }
            Some("/login") => "登录\n使用 Linux.do 登录".to_string(),
            Some("/my-codes") => "我的兑换码".to_string(),
            _ => String::new(),
        };
        Ok(text)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn export_state(&self) -> Result<SessionArtifact> {
        let page = locked(&self.page);
        let token = page
            .token
            .as_ref()
            .ok_or_else(|| CdkError::Browser("no session to export".to_string()))?;
        Ok(SessionArtifact::new(json!({ "token": token }).to_string()))
    }

    async fn restore_state(&self, artifact: &SessionArtifact) -> Result<()> {
        let value: Value = serde_json::from_str(artifact.as_str())?;
        let token = value["token"]
            .as_str()
            .ok_or_else(|| CdkError::Browser("artifact has no token".to_string()))?;
        locked(&self.page).token = Some(token.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut page = locked(&self.page);
        if !page.closed {
            page.closed = true;
            let mut site = locked(&self.site);
            site.open_browsers = site.open_browsers.saturating_sub(1);
        }
        Ok(())
    }

    async fn wait(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
///
/// # Examples
///
/// ```rust,ignore
/// use cdkfetch::assert_contains;
///
/// assert_contains!("done (allowance exhausted)", "exhausted");
/// ```
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
    ($haystack:expr, $needle:expr, $($arg:tt)*) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            $($arg)*
        );
    };
}

/// Assert that a string does NOT contain a substring.
#[macro_export]
macro_rules! assert_not_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            !haystack.contains(needle),
            "Expected string NOT to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
    ($haystack:expr, $needle:expr, $($arg:tt)*) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            !haystack.contains(needle),
            $($arg)*
        );
    };
}

/// Assert that a string is valid JSON.
#[macro_export]
macro_rules! assert_json_valid {
    ($json:expr) => {
        let json = $json;
        if let Err(e) = serde_json::from_str::<serde_json::Value>(json) {
            panic!(
                "Expected valid JSON, but parsing failed: {}\n\nJSON string:\n{}",
                e, json
            );
        }
    };
}

/// Assert that a string is valid JSON and equals the expected value.
#[macro_export]
macro_rules! assert_json_eq {
    ($json:expr, $expected:expr) => {
        let json = $json;
        let parsed: serde_json::Value = serde_json::from_str(json).expect("Invalid JSON");
        let expected: serde_json::Value = $expected;
        assert_eq!(
            parsed,
            expected,
            "JSON mismatch\n\nExpected:\n{}\n\nActual:\n{}",
            serde_json::to_string_pretty(&expected).unwrap(),
            serde_json::to_string_pretty(&parsed).unwrap()
        );
    };
}

/// Assert that a string does NOT contain ANSI escape codes.
#[macro_export]
macro_rules! assert_no_ansi_codes {
    ($text:expr) => {
        let text = $text;
        assert!(
            !text.contains('\x1b'),
            "Expected string to NOT contain ANSI escape codes.\n\nActual string:\n{:?}",
            text
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::AccountStore;

    #[tokio::test]
    async fn scripted_transport_replays_and_records() {
        let transport = ScriptedTransport::new();
        transport.push_json(201, json!({"ok": true}));

        let response = transport
            .send(HttpRequest::get("https://example.test/a"))
            .await
            .unwrap();
        assert_eq!(response.status, 201);
        assert!(transport.send(HttpRequest::get("https://example.test/b")).await.is_err());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn unauthenticated_draw_page_redirects_to_login() {
        let site = FakeLuckyDrawSite::new();
        let browser = site.browser();
        browser.navigate(&format!("{SITE_BASE}/luckydraw")).await.unwrap();
        assert_eq!(browser.current_url().await.unwrap(), format!("{SITE_BASE}/login"));

        browser.authenticate();
        browser.navigate(&format!("{SITE_BASE}/luckydraw")).await.unwrap();
        assert!(browser.current_url().await.unwrap().ends_with("/luckydraw"));
    }

    #[tokio::test]
    async fn closing_a_launched_browser_is_counted_once() {
        let site = FakeLuckyDrawSite::new();
        let browser = site.factory().launch(None).await.unwrap();
        assert_eq!(site.open_browsers(), 1);
        browser.close().await.unwrap();
        browser.close().await.unwrap();
        assert_eq!(site.open_browsers(), 0);
        assert!(browser.current_url().await.is_err());
    }

    #[test]
    fn sample_accounts_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, make_test_accounts_json()).unwrap();
        let store = AccountStore::load_from(&path).unwrap();
        assert_eq!(store.accounts().len(), 3);
    }

    #[test]
    fn assertion_macros() {
        assert_contains!("hello world", "world");
        assert_not_contains!("hello world", "bye");
        assert_json_valid!(r#"{"a": 1}"#);
        assert_json_eq!(r#"{"a": 1}"#, json!({"a": 1}));
        assert_no_ansi_codes!("plain");
    }
}
