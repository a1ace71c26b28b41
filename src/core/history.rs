//! Same-day code harvesting from a rendered history listing.
//!
//! Providers that do not return codes inline show them in a table of past
//! draws. Only rows stamped with the current business day (UTC+8) count.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::browser::Browser;
use crate::error::{CdkError, Result};

/// Offset of the platforms' business day.
pub const BUSINESS_OFFSET: FixedOffset = match FixedOffset::east_opt(8 * 3600) {
    Some(offset) => offset,
    None => panic!("invalid business offset"),
};

static CODE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{32}$").unwrap());

/// Column holding the code in the listing.
pub const CODE_COLUMN: usize = 0;
/// Column holding the acquisition time in the listing.
pub const TIME_COLUMN: usize = 3;

const LISTING_SCRIPT: &str = r"
return Array.from(document.querySelectorAll('tbody tr')).map(
  (row) => Array.from(row.querySelectorAll('td')).map((cell) => cell.innerText.trim())
);";

/// One row of the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub code: String,
    pub acquired_at: String,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(code: impl Into<String>, acquired_at: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            acquired_at: acquired_at.into(),
        }
    }
}

/// Calendar day of `now` in the business timezone.
#[must_use]
pub fn business_day(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&BUSINESS_OFFSET).date_naive()
}

/// Distinct well-formed codes acquired on `day`, in listing order.
#[must_use]
pub fn extract_today(entries: &[HistoryEntry], day: NaiveDate) -> Vec<String> {
    let prefix = day.format("%Y-%m-%d").to_string();
    let mut seen = HashSet::new();
    let mut codes = Vec::new();

    for entry in entries {
        let code = entry.code.trim().to_lowercase();
        if !CODE_REGEX.is_match(&code) {
            continue;
        }
        if !entry.acquired_at.trim().starts_with(&prefix) {
            continue;
        }
        if seen.insert(code.clone()) {
            codes.push(code);
        }
    }
    codes
}

/// Turn rows of cell texts into entries; short rows are skipped.
#[must_use]
pub fn entries_from_rows(rows: &[Vec<String>]) -> Vec<HistoryEntry> {
    rows.iter()
        .filter_map(|cells| {
            let code = cells.get(CODE_COLUMN)?;
            let time = cells.get(TIME_COLUMN)?;
            Some(HistoryEntry::new(code.clone(), time.clone()))
        })
        .collect()
}

/// Read the listing rows on the browser's current page.
///
/// # Errors
///
/// Returns an error if the script fails or returns something other than a
/// list of rows.
pub async fn read_listing(browser: &dyn Browser) -> Result<Vec<HistoryEntry>> {
    let value = browser.evaluate(LISTING_SCRIPT).await?;
    let Value::Array(rows) = value else {
        return Err(CdkError::ParseResponse(
            "history listing script did not return rows".to_string(),
        ));
    };

    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            row.as_array()
                .map(|cells| {
                    cells
                        .iter()
                        .map(|c| c.as_str().unwrap_or_default().to_string())
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();

    let entries = entries_from_rows(&rows);
    tracing::debug!(rows = rows.len(), entries = entries.len(), "Read history listing");
    Ok(entries)
}
