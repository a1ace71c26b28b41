//! Defensive accessors over untyped provider JSON.
//!
//! Reward platforms answer with inconsistent envelopes (`success`, `code`,
//! `message` or `msg`, `remaining`, `data.*`), so responses are kept as a
//! generic JSON document and read through dotted paths with defaults instead of
//! fixed schemas.

use serde_json::Value;

use crate::error::{CdkError, Result};

/// A parsed provider response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document(Value);

impl Document {
    /// Wrap an already parsed JSON value.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse a response body.
    ///
    /// # Errors
    ///
    /// Returns [`CdkError::ParseResponse`] when the body is not JSON.
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map(Self)
            .map_err(|e| CdkError::ParseResponse(e.to_string()))
    }

    /// The underlying JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Look up a dotted path (`data.today_record.cdk`). Nulls count as absent.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.0;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        (!current.is_null()).then_some(current)
    }

    /// Read a boolean flag, tolerating `1`/`0` and `"true"`/`"false"`.
    #[must_use]
    pub fn bool_or(&self, path: &str, default: bool) -> bool {
        match self.get(path) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().map_or(default, |v| v != 0),
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => default,
            },
            _ => default,
        }
    }

    /// Read a non-empty string.
    #[must_use]
    pub fn str_at(&self, path: &str) -> Option<&str> {
        self.get(path)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Read the first non-empty string among several candidate paths.
    #[must_use]
    pub fn first_str(&self, paths: &[&str]) -> Option<&str> {
        paths.iter().find_map(|path| self.str_at(path))
    }

    /// Read an integer; numeric strings are accepted.
    #[must_use]
    pub fn i64_at(&self, path: &str) -> Option<i64> {
        match self.get(path)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read a non-negative count; negative values clamp to zero.
    #[must_use]
    pub fn count_at(&self, path: &str) -> Option<u32> {
        self.i64_at(path)
            .map(|v| u32::try_from(v.max(0)).unwrap_or(u32::MAX))
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_paths_and_missing_keys() {
        let doc = Document::new(json!({
            "success": true,
            "data": { "can_spin": false, "today_record": { "cdk": "abc" } }
        }));

        assert_eq!(doc.str_at("data.today_record.cdk"), Some("abc"));
        assert!(!doc.bool_or("data.can_spin", true));
        assert!(doc.get("data.missing.deeper").is_none());
        assert!(doc.get("success.not_an_object").is_none());
    }

    #[test]
    fn null_and_empty_strings_are_absent() {
        let doc = Document::new(json!({ "message": "", "msg": "次数已用完", "code": null }));
        assert_eq!(doc.first_str(&["message", "msg"]), Some("次数已用完"));
        assert!(doc.get("code").is_none());
    }

    #[test]
    fn numbers_tolerate_strings_and_negatives() {
        let doc = Document::new(json!({ "a": "3", "b": -2, "c": 4.0, "d": "x" }));
        assert_eq!(doc.count_at("a"), Some(3));
        assert_eq!(doc.count_at("b"), Some(0));
        assert_eq!(doc.i64_at("c"), Some(4));
        assert_eq!(doc.i64_at("d"), None);
    }

    #[test]
    fn loose_booleans() {
        let doc = Document::new(json!({ "a": 1, "b": "false", "c": "maybe" }));
        assert!(doc.bool_or("a", false));
        assert!(!doc.bool_or("b", true));
        assert!(doc.bool_or("c", true));
        assert!(!doc.bool_or("missing", false));
    }

    #[test]
    fn parse_rejects_html() {
        assert!(Document::parse("<html>502 Bad Gateway</html>").is_err());
        assert!(Document::parse(r#"{"ok":1}"#).is_ok());
    }
}
