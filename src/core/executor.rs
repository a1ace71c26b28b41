//! Single-step execution under a per-call timeout.

use std::time::Duration;

use tokio::time::timeout;

use super::models::{RawOutcome, Step};
use super::provider::RewardFlow;

/// Runs one provider step and folds every failure into a transport outcome.
#[derive(Debug, Clone, Copy)]
pub struct ActionExecutor {
    timeout: Duration,
}

impl ActionExecutor {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Perform `step`. Never fails; errors and timeouts become
    /// [`RawOutcome::Transport`].
    pub async fn run(&self, flow: &mut dyn RewardFlow, step: Step) -> RawOutcome {
        let provider = flow.provider();
        match timeout(self.timeout, flow.perform(step)).await {
            Ok(Ok(outcome)) => {
                tracing::debug!(
                    provider = %provider,
                    step = %step,
                    outcome = %outcome.summary(),
                    "Step completed"
                );
                outcome
            }
            Ok(Err(e)) => {
                tracing::debug!(provider = %provider, step = %step, error = %e, "Step failed");
                RawOutcome::transport(e.to_string())
            }
            Err(_) => {
                tracing::debug!(
                    provider = %provider,
                    step = %step,
                    timeout = ?self.timeout,
                    "Step timed out"
                );
                RawOutcome::transport(format!("timed out after {:?}", self.timeout))
            }
        }
    }
}
