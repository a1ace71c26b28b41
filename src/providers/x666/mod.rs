//! x666 lottery (qd.x666.me).
//!
//! Bearer-token API with one spin per day. `POST /api/user/info` says whether
//! a spin is still available and repeats the code of today's spin if not.

use async_trait::async_trait;

use super::Endpoint;
use crate::core::classify::ResponseProfile;
use crate::core::http::Method;
use crate::core::models::{RawOutcome, Step};
use crate::core::provider::{AllowanceReading, Provider, RewardFlow};
use crate::error::Result;

const USER_INFO_PATH: &str = "/api/user/info";
const SPIN_PATH: &str = "/api/lottery/spin";

/// Spin responses nest the code under `data`.
pub const SPIN_PROFILE: ResponseProfile = ResponseProfile {
    code_paths: &["data.cdk"],
    ..ResponseProfile::STANDARD
};

pub struct X666Flow {
    endpoint: Endpoint,
    token: String,
}

impl X666Flow {
    #[must_use]
    pub const fn new(endpoint: Endpoint, token: String) -> Self {
        Self { endpoint, token }
    }
}

#[async_trait]
impl RewardFlow for X666Flow {
    fn provider(&self) -> Provider {
        Provider::X666
    }

    fn profile(&self) -> &ResponseProfile {
        &SPIN_PROFILE
    }

    async fn perform(&mut self, step: Step) -> Result<RawOutcome> {
        let path = match step {
            Step::QueryStatus => USER_INFO_PATH,
            Step::PerformAction => SPIN_PATH,
        };
        let request = self
            .endpoint
            .request(Method::Post, path, "/")
            .header("content-type", "application/json")
            .bearer(self.token.as_str());
        let outcome = self.endpoint.send(request).await?;

        if step == Step::PerformAction
            && let RawOutcome::Http { body, .. } = &outcome
            && let Some(label) = body.str_at("data.label")
        {
            tracing::info!(provider = "x666", prize = label, "Spin result");
        }
        Ok(outcome)
    }

    fn read_allowance(&self, outcome: &RawOutcome) -> AllowanceReading {
        let RawOutcome::Http { status, body } = outcome else {
            return AllowanceReading::Unobservable;
        };
        if *status != 200 || !body.bool_or("success", false) {
            return AllowanceReading::Unobservable;
        }
        if body.bool_or("data.can_spin", false) {
            AllowanceReading::Remaining(1)
        } else {
            AllowanceReading::Exhausted {
                existing_code: body.str_at("data.today_record.cdk").map(str::to_string),
            }
        }
    }
}
