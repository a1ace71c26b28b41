//! Spin-loop controller.
//!
//! Drives a [`RewardFlow`] through query, act and aggregate phases until the
//! allowance runs out, the provider reports the reward as taken, or a failure
//! stops the run. Codes are pushed into a shared [`CdkSink`] as they arrive so
//! a caller that cancels the loop still sees them.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::executor::ActionExecutor;
use super::models::{
    AcquisitionAttempt, CdkResult, Classification, DoneReason, RawOutcome, RewardAllowance, Step,
    Termination,
};
use super::provider::{AllowanceReading, RewardFlow};

/// Default number of same-step retries after a transient failure.
pub const DEFAULT_RETRY_BUDGET: u32 = 2;

/// Codes collected so far, shared with whoever may cancel the loop.
#[derive(Debug, Clone, Default)]
pub struct CdkSink {
    inner: Arc<Mutex<CdkResult>>,
    attempts: Arc<AtomicU32>,
}

impl CdkSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a code; duplicates are ignored.
    pub fn push(&self, code: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(code)
    }

    /// Replace everything collected so far.
    pub fn replace(&self, codes: CdkResult) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = codes;
    }

    /// Copy of the current codes.
    #[must_use]
    pub fn snapshot(&self) -> CdkResult {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Action attempts made so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }
}

/// Phases of one loop run.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Init,
    Querying,
    Acting,
    Aggregating(RawOutcome),
    Done(DoneReason),
    Aborted(String),
}

impl LoopState {
    const fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Querying => "querying",
            Self::Acting => "acting",
            Self::Aggregating(_) => "aggregating",
            Self::Done(_) => "done",
            Self::Aborted(_) => "aborted",
        }
    }
}

/// Knobs for one loop run.
#[derive(Debug, Clone, Copy)]
pub struct LoopPolicy {
    pub retry_budget: u32,
}

impl Default for LoopPolicy {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }
}

/// What one loop run produced.
#[derive(Debug, Clone)]
pub struct LoopReport {
    pub codes: CdkResult,
    /// Action attempts only; status queries are not counted.
    pub attempts: Vec<AcquisitionAttempt>,
    pub termination: Termination,
    pub initial_allowance: Option<RewardAllowance>,
}

impl LoopReport {
    /// Number of action attempts.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }
}

/// Drives the query/act/aggregate cycle for one account+provider pair.
#[derive(Debug, Clone, Copy)]
pub struct SpinLoop {
    executor: ActionExecutor,
    policy: LoopPolicy,
}

impl SpinLoop {
    #[must_use]
    pub const fn new(executor: ActionExecutor, policy: LoopPolicy) -> Self {
        Self { executor, policy }
    }

    /// Run the loop to completion. Partial codes are kept on every exit path.
    pub async fn run(&self, flow: &mut dyn RewardFlow, sink: &CdkSink) -> LoopReport {
        let provider = flow.provider();
        let budget = self.policy.retry_budget;

        let mut codes = CdkResult::new();
        let mut attempts: Vec<AcquisitionAttempt> = Vec::new();
        let mut allowance = RewardAllowance::assumed(0);
        let mut initial_allowance = None;
        let mut attempt_cap = 0u32;
        let mut query_failures = 0u32;
        let mut transient_failures = 0u32;

        let mut state = LoopState::Init;
        loop {
            tracing::trace!(provider = %provider, state = state.name(), "Loop state");
            state = match state {
                LoopState::Init => {
                    if !flow.supports_status_query() {
                        allowance = RewardAllowance::assumed(flow.assumed_allowance());
                        LoopState::Querying
                    } else {
                        let outcome = self.executor.run(flow, Step::QueryStatus).await;
                        if let RawOutcome::Transport { reason } = &outcome {
                            query_failures += 1;
                            if query_failures > budget {
                                LoopState::Aborted(format!("status query failed: {reason}"))
                            } else {
                                tracing::debug!(
                                    provider = %provider,
                                    retry = query_failures,
                                    "Retrying status query"
                                );
                                LoopState::Init
                            }
                        } else {
                            match flow.read_allowance(&outcome) {
                                AllowanceReading::Remaining(n) => {
                                    allowance = RewardAllowance::reported(n);
                                    LoopState::Querying
                                }
                                AllowanceReading::Unobservable => {
                                    allowance = RewardAllowance::assumed(flow.assumed_allowance());
                                    tracing::info!(
                                        provider = %provider,
                                        assumed = allowance.remaining,
                                        "Remaining count not observable; using approximation"
                                    );
                                    LoopState::Querying
                                }
                                AllowanceReading::Exhausted { existing_code } => {
                                    if let Some(code) = existing_code
                                        && codes.push(code.as_str())
                                    {
                                        sink.push(&code);
                                        tracing::info!(
                                            provider = %provider,
                                            "Reward already taken today; reusing issued code"
                                        );
                                    }
                                    LoopState::Done(DoneReason::AlreadyDone)
                                }
                            }
                        }
                    }
                }

                LoopState::Querying => {
                    initial_allowance = Some(allowance);
                    attempt_cap = allowance.remaining.saturating_add(budget);
                    tracing::info!(
                        provider = %provider,
                        remaining = allowance.remaining,
                        source = ?allowance.source,
                        "Allowance determined"
                    );
                    if allowance.is_exhausted() {
                        LoopState::Done(DoneReason::NoneRemaining)
                    } else {
                        LoopState::Acting
                    }
                }

                LoopState::Acting => {
                    if u32::try_from(attempts.len()).unwrap_or(u32::MAX) >= attempt_cap {
                        LoopState::Aborted("attempt cap reached".to_string())
                    } else {
                        LoopState::Aggregating(
                            self.executor.run(flow, Step::PerformAction).await,
                        )
                    }
                }

                LoopState::Aggregating(outcome) => {
                    let classification = flow.classify(&outcome);
                    let index = u32::try_from(attempts.len() + 1).unwrap_or(u32::MAX);
                    tracing::info!(
                        provider = %provider,
                        attempt = index,
                        classification = classification.label(),
                        "Attempt classified"
                    );
                    sink.record_attempt();
                    attempts.push(AcquisitionAttempt {
                        index,
                        step: Step::PerformAction,
                        outcome: outcome.summary(),
                        classification: classification.clone(),
                    });

                    match classification {
                        Classification::Success { code } => {
                            transient_failures = 0;
                            if let Some(code) = code
                                && codes.push(code.as_str())
                            {
                                sink.push(&code);
                            }
                            allowance = allowance.after_success(flow.reported_remaining(&outcome));
                            if allowance.is_exhausted() {
                                LoopState::Done(DoneReason::AllowanceExhausted)
                            } else {
                                LoopState::Acting
                            }
                        }
                        Classification::AlreadyDone => LoopState::Done(DoneReason::AlreadyDone),
                        Classification::NoneRemaining => LoopState::Done(DoneReason::NoneRemaining),
                        Classification::TransientFailure { reason } => {
                            transient_failures += 1;
                            if transient_failures > budget {
                                LoopState::Aborted(format!("retry budget exhausted: {reason}"))
                            } else {
                                LoopState::Acting
                            }
                        }
                        Classification::FatalFailure { reason } => LoopState::Aborted(reason),
                    }
                }

                LoopState::Done(reason) => {
                    tracing::info!(
                        provider = %provider,
                        codes = codes.len(),
                        attempts = attempts.len(),
                        reason = %reason,
                        "Loop done"
                    );
                    return LoopReport {
                        codes,
                        attempts,
                        termination: Termination::Done { reason },
                        initial_allowance,
                    };
                }

                LoopState::Aborted(reason) => {
                    tracing::warn!(
                        provider = %provider,
                        codes = codes.len(),
                        attempts = attempts.len(),
                        reason = %reason,
                        "Loop aborted"
                    );
                    return LoopReport {
                        codes,
                        attempts,
                        termination: Termination::Aborted { reason },
                        initial_allowance,
                    };
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::Document;
    use crate::core::models::AllowanceSource;
    use crate::core::provider::Provider;
    use crate::error::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Flow that replays canned outcomes.
    struct Canned {
        query: Option<VecDeque<RawOutcome>>,
        actions: VecDeque<RawOutcome>,
        reading: fn(&RawOutcome) -> AllowanceReading,
        performed: u32,
    }

    impl Canned {
        fn without_query(actions: Vec<RawOutcome>) -> Self {
            Self {
                query: None,
                actions: actions.into(),
                reading: |_| AllowanceReading::Unobservable,
                performed: 0,
            }
        }

        fn with_remaining(remaining: u32, actions: Vec<RawOutcome>) -> Self {
            Self {
                query: Some(VecDeque::from([http(json!({ "remaining": remaining }))])),
                actions: actions.into(),
                reading: |o| match o {
                    RawOutcome::Http { body, .. } => {
                        AllowanceReading::Remaining(body.count_at("remaining").unwrap_or(0))
                    }
                    _ => AllowanceReading::Unobservable,
                },
                performed: 0,
            }
        }
    }

    #[async_trait]
    impl RewardFlow for Canned {
        fn provider(&self) -> Provider {
            Provider::RunawaytimeWheel
        }

        fn supports_status_query(&self) -> bool {
            self.query.is_some()
        }

        async fn perform(&mut self, step: Step) -> Result<RawOutcome> {
            let next = match step {
                Step::QueryStatus => self.query.as_mut().and_then(VecDeque::pop_front),
                Step::PerformAction => {
                    self.performed += 1;
                    self.actions.pop_front()
                }
            };
            Ok(next.unwrap_or_else(|| RawOutcome::transport("script exhausted")))
        }

        fn read_allowance(&self, outcome: &RawOutcome) -> AllowanceReading {
            (self.reading)(outcome)
        }
    }

    fn http(body: serde_json::Value) -> RawOutcome {
        RawOutcome::Http {
            status: 200,
            body: Document::new(body),
        }
    }

    fn win(code: &str) -> RawOutcome {
        http(json!({ "success": true, "code": code }))
    }

    fn spin_loop(retry_budget: u32) -> SpinLoop {
        SpinLoop::new(
            ActionExecutor::new(Duration::from_secs(5)),
            LoopPolicy { retry_budget },
        )
    }

    #[test]
    fn loop_states_compare_by_payload() {
        let aggregating = LoopState::Aggregating(win("a"));
        assert_eq!(aggregating, LoopState::Aggregating(win("a")));
        assert_ne!(aggregating, LoopState::Aggregating(win("b")));
        assert_eq!(aggregating.name(), "aggregating");
        assert_eq!(LoopState::Done(DoneReason::AlreadyDone).name(), "done");
    }

    #[tokio::test]
    async fn zero_allowance_means_no_attempts_and_done() {
        let mut flow = Canned::with_remaining(0, vec![win("never")]);
        let report = spin_loop(2).run(&mut flow, &CdkSink::new()).await;
        assert_eq!(report.attempt_count(), 0);
        assert_eq!(flow.performed, 0);
        assert_eq!(
            report.termination,
            Termination::Done {
                reason: DoneReason::NoneRemaining
            }
        );
    }

    #[tokio::test]
    async fn n_successes_use_exactly_n_attempts() {
        let mut flow = Canned::with_remaining(3, vec![win("a"), win("b"), win("c"), win("d")]);
        let sink = CdkSink::new();
        let report = spin_loop(2).run(&mut flow, &sink).await;
        assert_eq!(report.attempt_count(), 3);
        assert_eq!(report.codes.as_slice(), ["a", "b", "c"]);
        assert_eq!(sink.snapshot(), report.codes);
        assert_eq!(
            report.termination,
            Termination::Done {
                reason: DoneReason::AllowanceExhausted
            }
        );
    }

    #[tokio::test]
    async fn duplicate_codes_are_suppressed() {
        let mut flow = Canned::with_remaining(3, vec![win("a"), win("a"), win("b")]);
        let report = spin_loop(2).run(&mut flow, &CdkSink::new()).await;
        assert_eq!(report.codes.as_slice(), ["a", "b"]);
        assert_eq!(report.attempt_count(), 3);
    }

    #[tokio::test]
    async fn transient_failures_beyond_budget_abort_with_partial_result() {
        let mut flow = Canned::with_remaining(
            3,
            vec![
                win("a"),
                RawOutcome::transport("reset"),
                RawOutcome::transport("reset"),
                RawOutcome::transport("reset"),
            ],
        );
        let report = spin_loop(2).run(&mut flow, &CdkSink::new()).await;
        assert_eq!(report.codes.as_slice(), ["a"]);
        assert_eq!(report.attempt_count(), 4);
        assert!(matches!(report.termination, Termination::Aborted { .. }));
    }

    #[tokio::test]
    async fn transient_failure_within_budget_retries_same_step() {
        let mut flow =
            Canned::with_remaining(1, vec![RawOutcome::transport("timeout"), win("a")]);
        let report = spin_loop(2).run(&mut flow, &CdkSink::new()).await;
        assert_eq!(report.codes.as_slice(), ["a"]);
        assert!(report.termination.is_clean());
    }

    #[tokio::test]
    async fn already_done_stops_and_keeps_codes() {
        let mut flow = Canned::with_remaining(
            5,
            vec![
                win("a"),
                http(json!({ "success": false, "message": "今日次数已用完" })),
            ],
        );
        let report = spin_loop(2).run(&mut flow, &CdkSink::new()).await;
        assert_eq!(report.codes.as_slice(), ["a"]);
        assert_eq!(
            report.termination,
            Termination::Done {
                reason: DoneReason::AlreadyDone
            }
        );
    }

    #[tokio::test]
    async fn fatal_failure_aborts_with_reason() {
        let mut flow = Canned::without_query(vec![RawOutcome::Http {
            status: 401,
            body: Document::new(json!({ "message": "token expired" })),
        }]);
        let report = spin_loop(2).run(&mut flow, &CdkSink::new()).await;
        assert_eq!(
            report.termination,
            Termination::Aborted {
                reason: "token expired".to_string()
            }
        );
    }

    #[tokio::test]
    async fn providers_without_query_assume_one_action() {
        let mut flow = Canned::without_query(vec![win("only"), win("extra")]);
        let report = spin_loop(2).run(&mut flow, &CdkSink::new()).await;
        assert_eq!(report.codes.as_slice(), ["only"]);
        assert_eq!(
            report.initial_allowance.map(|a| a.source),
            Some(AllowanceSource::Assumed)
        );
    }

    #[tokio::test]
    async fn reported_allowance_cannot_grow() {
        let mut flow = Canned {
            query: Some(VecDeque::from([http(json!({ "remaining": 2 }))])),
            actions: VecDeque::from([
                http(json!({ "success": true, "code": "a", "remaining": 10 })),
                http(json!({ "success": true, "code": "b", "remaining": 10 })),
                win("c"),
            ]),
            reading: |o| match o {
                RawOutcome::Http { body, .. } => {
                    AllowanceReading::Remaining(body.count_at("remaining").unwrap_or(0))
                }
                _ => AllowanceReading::Unobservable,
            },
            performed: 0,
        };
        let report = spin_loop(0).run(&mut flow, &CdkSink::new()).await;
        assert_eq!(report.codes.as_slice(), ["a", "b"]);
        assert_eq!(report.attempt_count(), 2);
    }

    #[tokio::test]
    async fn attempt_cap_bounds_transient_churn() {
        // Each transient is followed by a success, so the per-step counter
        // resets and only the cap stops the loop.
        let mut actions = Vec::new();
        for i in 0..10 {
            actions.push(RawOutcome::transport("flaky"));
            actions.push(win(&format!("c{i}")));
        }
        let mut flow = Canned::with_remaining(3, actions);
        let report = spin_loop(1).run(&mut flow, &CdkSink::new()).await;
        assert!(report.attempt_count() <= 3 + 1);
        assert_eq!(
            report.termination,
            Termination::Aborted {
                reason: "attempt cap reached".to_string()
            }
        );
        assert_eq!(report.codes.as_slice(), ["c0", "c1"]);
    }

    #[tokio::test]
    async fn exhausted_query_returns_existing_code() {
        let mut flow = Canned {
            query: Some(VecDeque::from([http(json!({ "cdk": "earlier" }))])),
            actions: VecDeque::new(),
            reading: |_| AllowanceReading::Exhausted {
                existing_code: Some("earlier".to_string()),
            },
            performed: 0,
        };
        let report = spin_loop(2).run(&mut flow, &CdkSink::new()).await;
        assert_eq!(report.codes.as_slice(), ["earlier"]);
        assert_eq!(flow.performed, 0);
        assert_eq!(
            report.termination,
            Termination::Done {
                reason: DoneReason::AlreadyDone
            }
        );
    }

    #[tokio::test]
    async fn failing_status_query_aborts_after_budget() {
        let mut flow = Canned {
            query: Some(VecDeque::new()),
            actions: VecDeque::from([win("never")]),
            reading: |_| AllowanceReading::Unobservable,
            performed: 0,
        };
        let report = spin_loop(1).run(&mut flow, &CdkSink::new()).await;
        assert_eq!(flow.performed, 0);
        match report.termination {
            Termination::Aborted { reason } => assert!(reason.starts_with("status query failed")),
            other => panic!("unexpected termination: {other:?}"),
        }
    }
}
