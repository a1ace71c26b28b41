//! b4u lucky draw (tw.b4u.qzz.io).
//!
//! Browser-driven. Login is delegated to LinuxDo OAuth, so a cached session
//! is reused whenever the draw button still renders. Spins do not reliably
//! show the code they awarded; codes are harvested from `/my-codes` after
//! the loop, keeping only rows stamped with the current business day.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;

use crate::core::browser::{Browser, Selector, is_enabled, query_first};
use crate::core::history::{business_day, extract_today, read_listing};
use crate::core::models::{RawOutcome, Step};
use crate::core::provider::{AllowanceReading, Provider, RewardFlow};
use crate::core::session::{IdentityProviderPlan, SessionPlan, SessionTimings};
use crate::error::Result;

const DRAW_PATH: &str = "/luckydraw";
const LOGIN_PATH: &str = "/login";
const CODES_PATH: &str = "/my-codes";
const SPIN_BUTTON_TEXT: &str = "开始抽奖";

/// Remaining-count phrasings seen on the draw page, most specific first.
static REMAINING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"今日剩余次数[：:]\s*(\d+)",
        r"剩余次数[：:]\s*(\d+)",
        r"剩余\s*(\d+)\s*次",
        r"还有\s*(\d+)\s*次",
        r"(\d+)\s*次机会",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// The draw button; only rendered for logged-in users.
#[must_use]
pub fn spin_button() -> Selector {
    Selector::with_text("button", SPIN_BUTTON_TEXT)
}

fn dialog_close_buttons() -> Vec<Selector> {
    ["确定", "关闭", "OK"]
        .into_iter()
        .map(|text| Selector::with_text("button", text))
        .collect()
}

/// Session plan for the site at `base_url`.
#[must_use]
pub fn session_plan(base_url: &str, timings: SessionTimings) -> SessionPlan {
    let base = base_url.trim_end_matches('/');
    let mut entry_points: Vec<Selector> = [
        r#"a[href*="linuxdo"]"#,
        r#"a[href*="linux.do"]"#,
        r#"a[href*="signin/linuxdo"]"#,
        r#"a[href*="auth/signin"]"#,
    ]
    .into_iter()
    .map(Selector::css)
    .collect();
    entry_points.extend(
        ["使用 Linux.do 登录", "Linux.do", "LinuxDo", "LINUX DO"]
            .into_iter()
            .map(|text| Selector::with_text("button", text)),
    );
    entry_points.extend(
        ["LinuxDo", "LINUX DO"]
            .into_iter()
            .map(|text| Selector::with_text("a", text)),
    );
    entry_points.push(Selector::css(r#"[data-provider="linuxdo"]"#));

    SessionPlan {
        provider: Provider::B4u,
        target_url: format!("{base}{DRAW_PATH}"),
        login_url: format!("{base}{LOGIN_PATH}"),
        login_surface_marker: LOGIN_PATH.to_string(),
        affordance: spin_button(),
        entry_points,
        identity_provider: IdentityProviderPlan {
            login_url_marker: "linux.do/login".to_string(),
            username_field: Selector::css("#login-account-name"),
            password_field: Selector::css("#login-account-password"),
            submit: Selector::css("#login-button"),
            consent_url_markers: vec![
                "connect.linux.do".to_string(),
                "oauth2/authorize".to_string(),
            ],
            approve: Selector::css(r#"a[href^="/oauth2/approve"]"#),
        },
        timings,
    }
}

/// Remaining draws stated in page text.
#[must_use]
pub fn parse_remaining(text: &str) -> Option<u32> {
    REMAINING_PATTERNS
        .iter()
        .find_map(|re| re.captures(text)?.get(1)?.as_str().parse().ok())
}

/// Waits around each draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawPacing {
    /// After navigation.
    pub settle: Duration,
    /// After clicking the draw button, for the wheel animation.
    pub spin_wait: Duration,
    /// After closing the result dialog.
    pub dialog_close: Duration,
    /// Before the next draw.
    pub between_spins: Duration,
}

impl Default for DrawPacing {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(5),
            spin_wait: Duration::from_secs(6),
            dialog_close: Duration::from_secs(1),
            between_spins: Duration::from_secs(2),
        }
    }
}

/// Draw flow on an already authenticated browser.
pub struct B4uFlow {
    browser: Arc<dyn Browser>,
    base_url: String,
    pacing: DrawPacing,
    assumed_allowance: u32,
}

impl B4uFlow {
    #[must_use]
    pub fn new(
        browser: Arc<dyn Browser>,
        base_url: &str,
        pacing: DrawPacing,
        assumed_allowance: u32,
    ) -> Self {
        Self {
            browser,
            base_url: base_url.trim_end_matches('/').to_string(),
            pacing,
            assumed_allowance,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn ensure_on(&self, path: &str) -> Result<()> {
        let url = self.browser.current_url().await?;
        if !url.contains(path) {
            self.browser.navigate(&self.url(path)).await?;
            self.browser.wait(self.pacing.settle).await;
        }
        Ok(())
    }

    async fn spin_control_available(&self) -> Result<Option<crate::core::browser::ElementHandle>> {
        let Some(button) = self.browser.query(&spin_button()).await? else {
            return Ok(None);
        };
        if is_enabled(self.browser.as_ref(), &button).await? {
            Ok(Some(button))
        } else {
            Ok(None)
        }
    }

    async fn close_dialog(&self) -> Result<()> {
        if let Some((_, close)) = query_first(self.browser.as_ref(), &dialog_close_buttons()).await? {
            self.browser.click(&close).await?;
            self.browser.wait(self.pacing.dialog_close).await;
        }
        Ok(())
    }
}

#[async_trait]
impl RewardFlow for B4uFlow {
    fn provider(&self) -> Provider {
        Provider::B4u
    }

    fn assumed_allowance(&self) -> u32 {
        self.assumed_allowance
    }

    fn delivers_out_of_band(&self) -> bool {
        true
    }

    async fn perform(&mut self, step: Step) -> Result<RawOutcome> {
        self.ensure_on(DRAW_PATH).await?;
        match step {
            Step::QueryStatus => {
                let control_available = self.spin_control_available().await?.is_some();
                let text = self.browser.page_text().await?;
                Ok(RawOutcome::Page {
                    text,
                    control_available,
                })
            }
            Step::PerformAction => {
                let Some(button) = self.spin_control_available().await? else {
                    tracing::info!(provider = "b4u", "Draw button missing or disabled");
                    return Ok(RawOutcome::Page {
                        text: self.browser.page_text().await?,
                        control_available: false,
                    });
                };
                self.browser.click(&button).await?;
                self.browser.wait(self.pacing.spin_wait).await;
                let text = self.browser.page_text().await?;

                if let Err(e) = self.close_dialog().await {
                    tracing::debug!(error = %e, "Could not close result dialog");
                }
                self.browser.wait(self.pacing.between_spins).await;
                Ok(RawOutcome::Page {
                    text,
                    control_available: true,
                })
            }
        }
    }

    fn read_allowance(&self, outcome: &RawOutcome) -> AllowanceReading {
        let RawOutcome::Page {
            text,
            control_available,
        } = outcome
        else {
            return AllowanceReading::Unobservable;
        };
        match parse_remaining(text) {
            Some(count) => AllowanceReading::Remaining(count),
            None if *control_available => AllowanceReading::Unobservable,
            None => AllowanceReading::Remaining(0),
        }
    }

    fn reported_remaining(&self, outcome: &RawOutcome) -> Option<u32> {
        match outcome {
            RawOutcome::Page { text, .. } => parse_remaining(text),
            _ => None,
        }
    }

    async fn harvest(&mut self) -> Result<Vec<String>> {
        self.browser.navigate(&self.url(CODES_PATH)).await?;
        self.browser.wait(self.pacing.settle).await;
        let entries = read_listing(self.browser.as_ref()).await?;
        let day = business_day(Utc::now());
        let codes = extract_today(&entries, day);
        tracing::info!(provider = "b4u", %day, found = codes.len(), "Harvested codes from history");
        Ok(codes)
    }
}
