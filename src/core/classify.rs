//! Response classification.
//!
//! Every attempt outcome maps to exactly one [`Classification`]. Explicit
//! success is checked before any negative-language heuristic because the
//! platforms answer HTTP 400 alongside `success: true` payloads.

use std::sync::LazyLock;

use regex::Regex;

use super::document::Document;
use super::models::{Classification, RawOutcome};

/// Phrases meaning "already completed for this period", matched
/// case-insensitively against the message field.
pub const ALREADY_MARKERS: &[&str] = &["already", "no more", "已经", "已签", "已抽", "次数"];

/// Phrases a draw page shows once today's draws are used up. The page always
/// carries a "剩余次数" label, so bare counter words cannot serve here.
pub const PAGE_ALREADY_MARKERS: &[&str] = &["今日已抽", "已经抽过", "次数已用完", "没有抽奖次数"];

/// Phrases a draw page shows when a spin consumed an allowance without a prize.
pub const NO_PRIZE_MARKERS: &[&str] = &["谢谢参与", "未中奖", "再接再厉"];

/// A 32-character hex code anywhere in page text.
static PAGE_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([a-f0-9]{32})").unwrap());

/// Where a provider keeps the fields the classifier reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseProfile {
    pub success_path: &'static str,
    /// Candidate code locations, first non-empty wins.
    pub code_paths: &'static [&'static str],
    pub message_paths: &'static [&'static str],
    pub remaining_path: Option<&'static str>,
}

impl ResponseProfile {
    /// `{"success": .., "code": .., "message"|"msg": ..}` at the top level.
    pub const STANDARD: Self = Self {
        success_path: "success",
        code_paths: &["code"],
        message_paths: &["message", "msg"],
        remaining_path: None,
    };
}

impl Default for ResponseProfile {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Classify one raw outcome.
#[must_use]
pub fn classify(outcome: &RawOutcome, profile: &ResponseProfile) -> Classification {
    match outcome {
        RawOutcome::Transport { reason } => Classification::TransientFailure {
            reason: reason.clone(),
        },
        RawOutcome::Http { status, body } => classify_http(*status, body, profile),
        RawOutcome::Page {
            text,
            control_available,
        } => classify_page(text, *control_available),
    }
}

fn classify_http(status: u16, body: &Document, profile: &ResponseProfile) -> Classification {
    if body.bool_or(profile.success_path, false)
        && let Some(code) = body.first_str(profile.code_paths)
    {
        return Classification::success(code.trim());
    }

    let message = body.first_str(profile.message_paths).unwrap_or_default();
    if has_already_marker(message) {
        let remaining = profile.remaining_path.and_then(|path| body.count_at(path));
        return if remaining == Some(0) {
            Classification::NoneRemaining
        } else {
            Classification::AlreadyDone
        };
    }

    if (400..500).contains(&status) {
        let reason = if message.is_empty() {
            format!("HTTP {status}")
        } else {
            message.to_string()
        };
        return Classification::FatalFailure { reason };
    }

    Classification::FatalFailure {
        reason: "unrecognized response".to_string(),
    }
}

/// Classify the visible text after a browser action.
///
/// `control_available` is false when the action control was missing or
/// disabled before the click was attempted.
fn classify_page(text: &str, control_available: bool) -> Classification {
    if !control_available {
        return Classification::NoneRemaining;
    }
    if let Some(code) = find_page_code(text) {
        return Classification::success(code);
    }
    if NO_PRIZE_MARKERS.iter().any(|m| text.contains(m)) {
        return Classification::Success { code: None };
    }
    if PAGE_ALREADY_MARKERS.iter().any(|m| text.contains(m)) {
        return Classification::AlreadyDone;
    }
    Classification::FatalFailure {
        reason: "unrecognized response".to_string(),
    }
}

/// Whether a message contains one of the "already completed" markers.
#[must_use]
pub fn has_already_marker(message: &str) -> bool {
    if message.is_empty() {
        return false;
    }
    let lowered = message.to_lowercase();
    ALREADY_MARKERS.iter().any(|m| lowered.contains(m))
}

/// First 32-hex code in page text, lowercased.
#[must_use]
pub fn find_page_code(text: &str) -> Option<String> {
    PAGE_CODE_REGEX
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Remaining count a response reported, if the profile knows where to look.
#[must_use]
pub fn reported_remaining(outcome: &RawOutcome, profile: &ResponseProfile) -> Option<u32> {
    match outcome {
        RawOutcome::Http { body, .. } => profile.remaining_path.and_then(|p| body.count_at(p)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http(status: u16, body: serde_json::Value) -> RawOutcome {
        RawOutcome::Http {
            status,
            body: Document::new(body),
        }
    }

    const WHEEL: ResponseProfile = ResponseProfile {
        remaining_path: Some("remaining"),
        ..ResponseProfile::STANDARD
    };

    #[test]
    fn explicit_success_wins_over_client_error_status() {
        let outcome = http(400, json!({ "success": true, "code": "abc123" }));
        assert_eq!(
            classify(&outcome, &ResponseProfile::STANDARD),
            Classification::success("abc123")
        );
    }

    #[test]
    fn already_message_is_already_done_regardless_of_status() {
        for status in [200, 400, 500] {
            let outcome = http(status, json!({ "success": false, "message": "您今天已经签到过了" }));
            assert_eq!(
                classify(&outcome, &ResponseProfile::STANDARD),
                Classification::AlreadyDone,
                "status {status}"
            );
        }
    }

    #[test]
    fn already_message_with_zero_remaining_is_none_remaining() {
        let outcome = http(400, json!({ "success": false, "msg": "No more spins", "remaining": 0 }));
        assert_eq!(classify(&outcome, &WHEEL), Classification::NoneRemaining);

        let outcome = http(400, json!({ "success": false, "msg": "No more spins", "remaining": 2 }));
        assert_eq!(classify(&outcome, &WHEEL), Classification::AlreadyDone);
    }

    #[test]
    fn success_without_code_falls_through_to_markers() {
        let outcome = http(200, json!({ "success": true, "code": "", "message": "抽奖次数已用完" }));
        assert_eq!(
            classify(&outcome, &ResponseProfile::STANDARD),
            Classification::AlreadyDone
        );
    }

    #[test]
    fn client_error_without_marker_is_fatal_with_message() {
        let outcome = http(401, json!({ "success": false, "message": "Unauthorized" }));
        assert_eq!(
            classify(&outcome, &ResponseProfile::STANDARD),
            Classification::FatalFailure {
                reason: "Unauthorized".to_string()
            }
        );

        let outcome = http(403, json!({}));
        assert_eq!(
            classify(&outcome, &ResponseProfile::STANDARD),
            Classification::FatalFailure {
                reason: "HTTP 403".to_string()
            }
        );
    }

    #[test]
    fn anything_else_is_unrecognized() {
        let outcome = http(200, json!({ "success": false }));
        assert_eq!(
            classify(&outcome, &ResponseProfile::STANDARD),
            Classification::FatalFailure {
                reason: "unrecognized response".to_string()
            }
        );
    }

    #[test]
    fn transport_failures_are_transient() {
        let outcome = RawOutcome::transport("connection reset");
        assert!(matches!(
            classify(&outcome, &ResponseProfile::STANDARD),
            Classification::TransientFailure { .. }
        ));
    }

    #[test]
    fn nested_code_paths() {
        let profile = ResponseProfile {
            code_paths: &["data.cdk"],
            ..ResponseProfile::STANDARD
        };
        let outcome = http(200, json!({ "success": true, "data": { "cdk": "X-1", "label": "5$" } }));
        assert_eq!(classify(&outcome, &profile), Classification::success("X-1"));
    }

    #[test]
    fn page_outcomes() {
        let code = "0123456789abcdef0123456789ABCDEF";
        let won = RawOutcome::Page {
            text: format!("恭喜中奖 兑换码: {code}"),
            control_available: true,
        };
        assert_eq!(
            classify(&won, &ResponseProfile::STANDARD),
            Classification::success(code.to_lowercase())
        );

        let no_prize = RawOutcome::Page {
            text: "谢谢参与".to_string(),
            control_available: true,
        };
        assert_eq!(
            classify(&no_prize, &ResponseProfile::STANDARD),
            Classification::Success { code: None }
        );

        let disabled = RawOutcome::Page {
            text: String::new(),
            control_available: false,
        };
        assert_eq!(
            classify(&disabled, &ResponseProfile::STANDARD),
            Classification::NoneRemaining
        );

        let odd = RawOutcome::Page {
            text: "loading".to_string(),
            control_available: true,
        };
        assert!(matches!(
            classify(&odd, &ResponseProfile::STANDARD),
            Classification::FatalFailure { .. }
        ));
    }

    #[test]
    fn remaining_label_does_not_read_as_already_done() {
        let unknown = RawOutcome::Page {
            text: "幸运大转盘\n今日剩余次数：3\n网络繁忙，请稍后".to_string(),
            control_available: true,
        };
        assert_eq!(
            classify(&unknown, &ResponseProfile::STANDARD),
            Classification::FatalFailure {
                reason: "unrecognized response".to_string()
            }
        );

        let used_up = RawOutcome::Page {
            text: "今日剩余次数：0\n今日已抽奖，明天再来".to_string(),
            control_available: true,
        };
        assert_eq!(
            classify(&used_up, &ResponseProfile::STANDARD),
            Classification::AlreadyDone
        );
    }

    #[test]
    fn reported_remaining_reads_profile_path() {
        let outcome = http(200, json!({ "success": true, "code": "a", "remaining": "3" }));
        assert_eq!(reported_remaining(&outcome, &WHEEL), Some(3));
        assert_eq!(reported_remaining(&outcome, &ResponseProfile::STANDARD), None);
    }
}
