//! Acquisition pipeline.
//!
//! Wires credentials, sessions, the spin loop and history harvesting together
//! for one account+provider pair, and fans out across pairs.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::time::{Duration, timeout};

use super::browser::{Browser, BrowserFactory};
use super::executor::ActionExecutor;
use super::http::{ReqwestTransport, Transport};
use super::models::{AcquisitionReport, CdkResult, ProviderCredentials, Termination};
use super::provider::{Provider, RewardFlow};
use super::session::SessionManager;
use super::spin_loop::{CdkSink, LoopPolicy, SpinLoop};
use super::webdriver::WebDriverFactory;
use crate::error::{CdkError, Result};
use crate::providers::b4u::{self, B4uFlow, DrawPacing};
use crate::providers::{Endpoint, build_http_flow};
use crate::storage::{Account, ResolvedConfig, SessionStore};

/// Everything a run needs, passed explicitly to every component.
pub struct RunContext {
    pub config: ResolvedConfig,
    pub transport: Arc<dyn Transport>,
    pub sessions: Arc<SessionStore>,
    pub browser_factory: Arc<dyn BrowserFactory>,
}

impl RunContext {
    #[must_use]
    pub fn new(
        config: ResolvedConfig,
        transport: Arc<dyn Transport>,
        sessions: Arc<SessionStore>,
        browser_factory: Arc<dyn BrowserFactory>,
    ) -> Self {
        Self {
            config,
            transport,
            sessions,
            browser_factory,
        }
    }

    /// Production wiring: `reqwest` transport and a WebDriver browser.
    #[must_use]
    pub fn from_config(config: ResolvedConfig) -> Self {
        let transport = Arc::new(ReqwestTransport::new(config.timeout, config.proxy.clone()));
        let sessions = Arc::new(SessionStore::new(config.sessions_dir.clone()));
        let browser_factory = Arc::new(WebDriverFactory {
            endpoint: config.file.browser.webdriver_url.clone(),
            headless: config.file.browser.headless,
            timeout: config.timeout,
        });
        Self::new(config, transport, sessions, browser_factory)
    }

    fn spin_loop(&self) -> SpinLoop {
        SpinLoop::new(
            ActionExecutor::new(self.config.timeout),
            LoopPolicy {
                retry_budget: self.config.retry_budget,
            },
        )
    }

    fn draw_pacing(&self) -> DrawPacing {
        let browser = &self.config.file.browser;
        DrawPacing {
            settle: Duration::from_millis(browser.settle_ms),
            spin_wait: Duration::from_millis(browser.spin_wait_ms),
            between_spins: Duration::from_millis(browser.between_spins_ms),
            ..DrawPacing::default()
        }
    }

    fn base_url(&self, provider: Provider) -> String {
        self.config.file.providers.base_url(provider)
    }
}

/// Result of the part of a run that may be cut short by the deadline.
struct PairOutcome {
    codes: CdkResult,
    termination: Termination,
}

/// Account+provider pairs to run, in account then provider order.
///
/// With an explicit provider selection, a pair lacking credentials is kept
/// so the run reports it; otherwise such pairs are skipped.
#[must_use]
pub fn plan_runs<'a>(config: &ResolvedConfig, accounts: &[&'a Account]) -> Vec<(&'a Account, Provider)> {
    let explicit = config.providers_explicit();
    let providers = config.providers.providers();
    let mut pairs = Vec::new();

    for account in accounts {
        for &provider in &providers {
            if !config.file.providers.is_enabled(provider) {
                tracing::debug!(provider = %provider, "Provider disabled in config");
                continue;
            }
            if !account.allows(provider) {
                continue;
            }
            if !explicit && !account.has_credentials_for(provider) {
                tracing::debug!(
                    account = %account.name,
                    provider = %provider,
                    "Skipping provider without credentials"
                );
                continue;
            }
            pairs.push((*account, provider));
        }
    }
    pairs
}

/// Run every planned pair concurrently.
pub async fn acquire_all(ctx: &RunContext, accounts: &[&Account]) -> Vec<AcquisitionReport> {
    let pairs = plan_runs(&ctx.config, accounts);
    tracing::info!(runs = pairs.len(), "Starting acquisition");
    let futures = pairs
        .into_iter()
        .map(|(account, provider)| acquire(ctx, account, provider));
    futures::future::join_all(futures).await
}

/// Run one account+provider pair to a report. Never fails; problems end up
/// in the report's termination.
pub async fn acquire(ctx: &RunContext, account: &Account, provider: Provider) -> AcquisitionReport {
    let started_at = Utc::now();
    let start = Instant::now();
    let sink = CdkSink::new();

    let outcome = match account.credentials_for(provider) {
        Err(e) => Err(e),
        Ok(credentials) => run_with_deadline(ctx, account, provider, credentials, &sink).await,
    };

    let (codes, termination) = match outcome {
        Ok(PairOutcome { codes, termination }) => (codes, termination),
        Err(e) => {
            tracing::warn!(
                account = %account.name,
                provider = %provider,
                error = %e,
                "Run failed"
            );
            (
                sink.snapshot(),
                Termination::Failed {
                    error: e.to_string(),
                    code: e.error_code().to_string(),
                },
            )
        }
    };

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(
        account = %account.name,
        provider = %provider,
        codes = codes.len(),
        termination = %termination.describe(),
        duration_ms,
        "Run finished"
    );

    AcquisitionReport {
        account: account.name.clone(),
        identity: account.identity(),
        provider: provider.cli_name().to_string(),
        codes,
        termination,
        attempts: sink.attempts(),
        started_at,
        duration_ms,
    }
}

async fn run_with_deadline(
    ctx: &RunContext,
    account: &Account,
    provider: Provider,
    credentials: ProviderCredentials,
    sink: &CdkSink,
) -> Result<PairOutcome> {
    let proxy = account
        .effective_proxy(ctx.config.proxy.as_deref())
        .map(str::to_string);

    // Launched outside the deadline so the browser can be closed after it.
    let browser = if provider.requires_browser() {
        Some(ctx.browser_factory.launch(proxy.as_deref()).await?)
    } else {
        None
    };

    let body = async {
        match &browser {
            Some(browser) => run_browser_flow(ctx, account, credentials, Arc::clone(browser), sink).await,
            None => run_http_flow(ctx, provider, credentials, proxy, sink).await,
        }
    };

    let result = match ctx.config.deadline {
        Some(limit) => match timeout(limit, body).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    account = %account.name,
                    provider = %provider,
                    seconds = limit.as_secs(),
                    "Deadline elapsed; keeping codes collected so far"
                );
                Ok(PairOutcome {
                    codes: sink.snapshot(),
                    termination: Termination::TimedOut {
                        seconds: limit.as_secs(),
                    },
                })
            }
        },
        None => body.await,
    };

    if let Some(browser) = browser
        && let Err(e) = browser.close().await
    {
        tracing::debug!(error = %e, "Browser close failed");
    }
    result
}

async fn run_http_flow(
    ctx: &RunContext,
    provider: Provider,
    credentials: ProviderCredentials,
    proxy: Option<String>,
    sink: &CdkSink,
) -> Result<PairOutcome> {
    let endpoint = Endpoint::new(Arc::clone(&ctx.transport), ctx.base_url(provider), proxy);
    let mut flow = build_http_flow(provider, credentials, endpoint)?;
    let report = ctx.spin_loop().run(flow.as_mut(), sink).await;
    harvest(flow.as_mut(), report.codes, report.termination, sink).await
}

async fn run_browser_flow(
    ctx: &RunContext,
    account: &Account,
    credentials: ProviderCredentials,
    browser: Arc<dyn Browser>,
    sink: &CdkSink,
) -> Result<PairOutcome> {
    let ProviderCredentials::UsernamePassword { username, password } = credentials else {
        return Err(CdkError::Config(format!(
            "b4u needs username-password credentials, got {}",
            credentials.kind()
        )));
    };

    let base_url = ctx.base_url(Provider::B4u);
    let identity = account.identity();
    let plan = b4u::session_plan(&base_url, ctx.config.file.browser.session_timings());
    let mut manager = SessionManager::new(Arc::clone(&ctx.sessions), plan)
        .with_screenshot_dir(Some(ctx.config.screenshot_dir.clone()));
    let established = manager
        .establish(browser.as_ref(), &identity, &username, &password)
        .await?;
    tracing::info!(account = %account.name, session = ?established, "Session ready");

    let mut flow = B4uFlow::new(
        browser,
        &base_url,
        ctx.draw_pacing(),
        ctx.config.file.browser.assumed_allowance,
    );
    let report = ctx.spin_loop().run(&mut flow, sink).await;
    harvest(&mut flow, report.codes, report.termination, sink).await
}

/// For flows that deliver codes out of band, replace the inline codes with
/// the history listing when it can be read.
async fn harvest(
    flow: &mut dyn RewardFlow,
    inline: CdkResult,
    termination: Termination,
    sink: &CdkSink,
) -> Result<PairOutcome> {
    if !flow.delivers_out_of_band() {
        return Ok(PairOutcome {
            codes: inline,
            termination,
        });
    }
    match flow.harvest().await {
        Ok(harvested) => {
            let codes: CdkResult = harvested.into_iter().collect();
            sink.replace(codes.clone());
            Ok(PairOutcome { codes, termination })
        }
        Err(e) => {
            tracing::warn!(error = %e, "History harvest failed; keeping inline codes");
            let termination = match termination {
                Termination::Done { .. } => Termination::Aborted {
                    reason: format!("history harvest failed: {e}"),
                },
                other => other,
            };
            Ok(PairOutcome {
                codes: inline,
                termination,
            })
        }
    }
}

/// Number of reports that did not end cleanly.
#[must_use]
pub fn failed_count(reports: &[AcquisitionReport]) -> usize {
    reports
        .iter()
        .filter(|r| !r.termination.is_clean())
        .count()
}
