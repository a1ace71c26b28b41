//! Runawaytime welfare site (fuli.hxi.me).
//!
//! Two reward flows share the cookie-jar session:
//! - daily check-in: `GET /api/checkin/status` then `POST /api/checkin`
//! - wheel: `GET /api/wheel/status` then `POST /api/wheel` until `remaining`
//!   reaches zero
//!
//! Codes come back inline in the `code` field.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::Endpoint;
use crate::core::classify::ResponseProfile;
use crate::core::http::Method;
use crate::core::models::{RawOutcome, Step};
use crate::core::provider::{AllowanceReading, Provider, RewardFlow};
use crate::error::Result;

const CHECKIN_STATUS_PATH: &str = "/api/checkin/status";
const CHECKIN_PATH: &str = "/api/checkin";
const WHEEL_STATUS_PATH: &str = "/api/wheel/status";
const WHEEL_PATH: &str = "/api/wheel";

/// Wheel responses report the spins left next to the code.
pub const WHEEL_PROFILE: ResponseProfile = ResponseProfile {
    remaining_path: Some("remaining"),
    ..ResponseProfile::STANDARD
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Checkin,
    Wheel,
}

/// Check-in or wheel flow for one account.
pub struct RunawaytimeFlow {
    endpoint: Endpoint,
    cookies: BTreeMap<String, String>,
    mode: Mode,
}

impl RunawaytimeFlow {
    #[must_use]
    pub const fn checkin(endpoint: Endpoint, cookies: BTreeMap<String, String>) -> Self {
        Self {
            endpoint,
            cookies,
            mode: Mode::Checkin,
        }
    }

    #[must_use]
    pub const fn wheel(endpoint: Endpoint, cookies: BTreeMap<String, String>) -> Self {
        Self {
            endpoint,
            cookies,
            mode: Mode::Wheel,
        }
    }

    const fn paths(&self) -> (&'static str, &'static str, &'static str) {
        match self.mode {
            Mode::Checkin => (CHECKIN_STATUS_PATH, CHECKIN_PATH, "/"),
            Mode::Wheel => (WHEEL_STATUS_PATH, WHEEL_PATH, "/wheel"),
        }
    }
}

#[async_trait]
impl RewardFlow for RunawaytimeFlow {
    fn provider(&self) -> Provider {
        match self.mode {
            Mode::Checkin => Provider::RunawaytimeCheckin,
            Mode::Wheel => Provider::RunawaytimeWheel,
        }
    }

    fn profile(&self) -> &ResponseProfile {
        match self.mode {
            Mode::Checkin => &ResponseProfile::STANDARD,
            Mode::Wheel => &WHEEL_PROFILE,
        }
    }

    async fn perform(&mut self, step: Step) -> Result<RawOutcome> {
        let (status_path, action_path, referer) = self.paths();
        let request = match step {
            Step::QueryStatus => self.endpoint.request(Method::Get, status_path, referer),
            Step::PerformAction => self.endpoint.request(Method::Post, action_path, referer),
        };
        self.endpoint.send(request.cookies(&self.cookies)).await
    }

    fn read_allowance(&self, outcome: &RawOutcome) -> AllowanceReading {
        let RawOutcome::Http { status, body } = outcome else {
            return AllowanceReading::Unobservable;
        };
        match self.mode {
            Mode::Checkin => {
                if *status != 200 {
                    return AllowanceReading::Unobservable;
                }
                if body.bool_or("checked", false) {
                    AllowanceReading::Exhausted {
                        existing_code: None,
                    }
                } else {
                    AllowanceReading::Remaining(1)
                }
            }
            // No readable status means no spins to take.
            Mode::Wheel => {
                if *status != 200 {
                    return AllowanceReading::Remaining(0);
                }
                AllowanceReading::Remaining(body.count_at("remaining").unwrap_or(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Classification;
    use std::sync::Arc;

    use crate::test_utils::ScriptedTransport;

    fn flow(wheel: bool, transport: Arc<ScriptedTransport>) -> RunawaytimeFlow {
        let endpoint = Endpoint::new(transport, "https://fuli.hxi.me", None);
        let cookies = BTreeMap::from([("session".to_string(), "abc".to_string())]);
        if wheel {
            RunawaytimeFlow::wheel(endpoint, cookies)
        } else {
            RunawaytimeFlow::checkin(endpoint, cookies)
        }
    }

    #[test]
    fn checkin_status_reading() {
        let f = flow(false, Arc::new(ScriptedTransport::new()));
        assert_eq!(
            f.read_allowance(&RawOutcome::from_http(200, r#"{"checked": true}"#)),
            AllowanceReading::Exhausted {
                existing_code: None
            }
        );
        assert_eq!(
            f.read_allowance(&RawOutcome::from_http(200, r#"{"checked": false}"#)),
            AllowanceReading::Remaining(1)
        );
        assert_eq!(
            f.read_allowance(&RawOutcome::from_http(500, "{}")),
            AllowanceReading::Unobservable
        );
    }

    #[test]
    fn wheel_status_reading() {
        let f = flow(true, Arc::new(ScriptedTransport::new()));
        assert_eq!(
            f.read_allowance(&RawOutcome::from_http(200, r#"{"remaining": "3"}"#)),
            AllowanceReading::Remaining(3)
        );
        assert_eq!(
            f.read_allowance(&RawOutcome::from_http(403, r#"{"remaining": 3}"#)),
            AllowanceReading::Remaining(0)
        );
    }

    #[test]
    fn wheel_reports_remaining_with_the_code() {
        let f = flow(true, Arc::new(ScriptedTransport::new()));
        let outcome = RawOutcome::from_http(200, r#"{"success": true, "code": "w1", "remaining": 1}"#);
        assert_eq!(f.classify(&outcome), Classification::success("w1"));
        assert_eq!(f.reported_remaining(&outcome), Some(1));
    }

    #[tokio::test]
    async fn perform_sends_cookies_to_the_right_paths() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, serde_json::json!({"checked": false}));
        transport.push_json(400, serde_json::json!({"success": true, "code": "c1"}));

        let mut f = flow(false, transport.clone());
        f.perform(Step::QueryStatus).await.unwrap();
        let outcome = f.perform(Step::PerformAction).await.unwrap();
        assert_eq!(f.classify(&outcome), Classification::success("c1"));

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[0].url, "https://fuli.hxi.me/api/checkin/status");
        assert_eq!(requests[1].method, Method::Post);
        assert_eq!(requests[1].url, "https://fuli.hxi.me/api/checkin");
        assert_eq!(
            requests[1].cookie_header().as_deref(),
            Some("i18next=en; session=abc")
        );
    }
}
