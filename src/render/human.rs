//! Human-readable output using `colored`.
//!
//! One block per account+provider run, then a summary line.

use colored::{ColoredString, Colorize};

use super::robot::status_label;
use crate::core::models::{
    AccountSummary, AcquisitionReport, ProviderInfo, SessionSummary, Termination,
};
use crate::error::Result;

/// Apply `style` unless color is disabled.
fn paint(text: &str, no_color: bool, style: impl Fn(&str) -> ColoredString) -> String {
    if no_color {
        text.to_string()
    } else {
        style(text).to_string()
    }
}

fn status_colored(termination: &Termination, no_color: bool) -> String {
    let label = status_label(termination);
    paint(label, no_color, |s| match termination {
        Termination::Done { .. } => s.green().bold(),
        Termination::Aborted { .. } => s.yellow().bold(),
        Termination::Failed { .. } | Termination::TimedOut { .. } => s.red().bold(),
    })
}

/// Render acquisition reports for human consumption.
pub fn render_acquire(reports: &[AcquisitionReport], no_color: bool) -> Result<String> {
    if reports.is_empty() {
        return Ok(paint(
            "Nothing to run: no account has credentials for the selected providers.\n",
            no_color,
            |s| s.dimmed(),
        ));
    }

    let mut output = String::new();
    for report in reports {
        let title = format!("{} / {}", report.account, report.provider);
        output.push_str(&format!(
            "{}  {}\n",
            paint(&title, no_color, |s| s.cyan().bold()),
            status_colored(&report.termination, no_color),
        ));

        match &report.termination {
            Termination::Done { reason } => {
                output.push_str(&format!("  {reason}\n"));
            }
            other => {
                output.push_str(&format!(
                    "  {}\n",
                    paint(&other.describe(), no_color, |s| s.yellow())
                ));
            }
        }

        if report.codes.is_empty() {
            output.push_str(&format!("  {}\n", paint("no codes", no_color, |s| s.dimmed())));
        } else {
            for code in report.codes.as_slice() {
                output.push_str(&format!("  {}\n", paint(code, no_color, |s| s.bold())));
            }
        }

        output.push_str(&format!(
            "  {}\n\n",
            paint(
                &format!(
                    "{} attempt(s), {:.1}s",
                    report.attempts,
                    millis_to_secs(report.duration_ms)
                ),
                no_color,
                |s| s.dimmed()
            )
        ));
    }

    let total: usize = reports.iter().map(|r| r.codes.len()).sum();
    let failed = reports.iter().filter(|r| !r.termination.is_clean()).count();
    let summary = format!(
        "{total} code(s) from {} run(s), {failed} not clean",
        reports.len()
    );
    output.push_str(&paint(&summary, no_color, |s| {
        if failed == 0 { s.green() } else { s.yellow() }
    }));
    output.push('\n');

    Ok(output)
}

#[allow(clippy::cast_precision_loss)]
fn millis_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Render configured accounts.
pub fn render_accounts(accounts: &[AccountSummary], no_color: bool) -> Result<String> {
    let mut output = String::new();
    for account in accounts {
        output.push_str(&format!(
            "{} ({})\n",
            paint(&account.name, no_color, |s| s.cyan().bold()),
            account.identity
        ));
        if !account.runnable.is_empty() {
            output.push_str(&format!(
                "  runs: {}\n",
                paint(&account.runnable.join(", "), no_color, |s| s.green())
            ));
        }
        if !account.missing.is_empty() {
            output.push_str(&format!(
                "  missing credentials: {}\n",
                paint(&account.missing.join(", "), no_color, |s| s.yellow())
            ));
        }
        if account.has_proxy {
            output.push_str("  proxy: yes\n");
        }
    }
    Ok(output)
}

/// Render cached sessions.
pub fn render_sessions(sessions: &[SessionSummary], no_color: bool) -> Result<String> {
    if sessions.is_empty() {
        return Ok(paint("No cached sessions.\n", no_color, |s| s.dimmed()));
    }
    let mut output = String::new();
    for session in sessions {
        let owner = session.account.as_deref().unwrap_or("(unknown account)");
        output.push_str(&format!(
            "{}  {}  {}  saved {}\n",
            paint(session.identity.as_str(), no_color, |s| s.bold()),
            owner,
            session.provider,
            session.saved_at.format("%Y-%m-%d %H:%M UTC"),
        ));
    }
    Ok(output)
}

/// Render the provider table.
pub fn render_providers(providers: &[ProviderInfo], no_color: bool) -> Result<String> {
    let mut output = String::new();
    for provider in providers {
        let state = if provider.enabled {
            paint("enabled", no_color, |s| s.green())
        } else {
            paint("disabled", no_color, |s| s.dimmed())
        };
        output.push_str(&format!(
            "{:<22} {:<24} {:<14} {}\n",
            paint(&provider.name, no_color, |s| s.cyan()),
            provider.display_name,
            provider.credential,
            state,
        ));
    }
    Ok(output)
}
