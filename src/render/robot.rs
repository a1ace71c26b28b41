//! Robot-mode output (JSON and Markdown).
//!
//! Provides stable, token-efficient output for scripts and agents. Every JSON
//! document is wrapped in a [`RobotOutput`] envelope.

use crate::core::models::{
    AccountSummary, AcquisitionReport, ProviderInfo, RobotOutput, SessionSummary, Termination,
};
use crate::error::Result;

/// Render any `RobotOutput` as JSON.
pub fn render_json<T: serde::Serialize>(output: &T) -> Result<String> {
    Ok(serde_json::to_string(output)?)
}

/// Render any `RobotOutput` as pretty JSON.
pub fn render_json_pretty<T: serde::Serialize>(output: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(output)?)
}

fn render_envelope<T: serde::Serialize>(output: &RobotOutput<T>, pretty: bool) -> Result<String> {
    if pretty {
        render_json_pretty(output)
    } else {
        render_json(output)
    }
}

/// Render acquisition reports as JSON.
///
/// Runs that did not end cleanly are also listed in `errors`.
pub fn render_acquire_json(reports: &[AcquisitionReport], pretty: bool) -> Result<String> {
    let errors = reports
        .iter()
        .filter(|r| !r.termination.is_clean())
        .map(|r| format!("{}/{}: {}", r.account, r.provider, r.termination.describe()))
        .collect();
    let output = RobotOutput::with_errors("acquire", reports, errors);
    render_envelope(&output, pretty)
}

/// Render acquisition reports as Markdown.
pub fn render_acquire_md(reports: &[AcquisitionReport]) -> Result<String> {
    let mut output = String::new();

    for report in reports {
        output.push_str(&format!("## {} / {}\n", report.account, report.provider));
        output.push_str(&format!("- status: {}\n", status_label(&report.termination)));
        if !report.termination.is_clean() {
            output.push_str(&format!("- detail: {}\n", report.termination.describe()));
        }
        output.push_str(&format!("- attempts: {}\n", report.attempts));
        output.push_str(&format!("- duration_ms: {}\n", report.duration_ms));

        if report.codes.is_empty() {
            output.push_str("- codes: none\n");
        } else {
            output.push_str("- codes:\n");
            for code in report.codes.as_slice() {
                output.push_str(&format!("  - `{code}`\n"));
            }
        }
        output.push('\n');
    }

    Ok(output)
}

/// Short status word shared by the Markdown and human renderers.
#[must_use]
pub const fn status_label(termination: &Termination) -> &'static str {
    match termination {
        Termination::Done { .. } => "done",
        Termination::Aborted { .. } => "aborted",
        Termination::Failed { .. } => "failed",
        Termination::TimedOut { .. } => "timed-out",
    }
}

/// Render configured accounts as JSON.
pub fn render_accounts_json(accounts: &[AccountSummary], pretty: bool) -> Result<String> {
    render_envelope(&RobotOutput::new("accounts", accounts), pretty)
}

/// Render configured accounts as Markdown.
pub fn render_accounts_md(accounts: &[AccountSummary]) -> Result<String> {
    let mut output = String::from("| account | identity | runnable | missing |\n");
    output.push_str("|---|---|---|---|\n");
    for account in accounts {
        output.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            account.name,
            account.identity,
            join_or_dash(&account.runnable),
            join_or_dash(&account.missing),
        ));
    }
    Ok(output)
}

/// Render cached sessions as JSON.
pub fn render_sessions_json(sessions: &[SessionSummary], pretty: bool) -> Result<String> {
    render_envelope(&RobotOutput::new("sessions", sessions), pretty)
}

/// Render cached sessions as Markdown.
pub fn render_sessions_md(sessions: &[SessionSummary]) -> Result<String> {
    if sessions.is_empty() {
        return Ok("No cached sessions.\n".to_string());
    }
    let mut output = String::from("| identity | account | provider | saved_at |\n");
    output.push_str("|---|---|---|---|\n");
    for session in sessions {
        output.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            session.identity,
            session.account.as_deref().unwrap_or("-"),
            session.provider,
            session.saved_at.to_rfc3339(),
        ));
    }
    Ok(output)
}

/// Render the provider table as JSON.
pub fn render_providers_json(providers: &[ProviderInfo], pretty: bool) -> Result<String> {
    render_envelope(&RobotOutput::new("providers", providers), pretty)
}

/// Render the provider table as Markdown.
pub fn render_providers_md(providers: &[ProviderInfo]) -> Result<String> {
    let mut output = String::from("| provider | credential | browser | enabled | base_url |\n");
    output.push_str("|---|---|---|---|---|\n");
    for provider in providers {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            provider.name, provider.credential, provider.browser, provider.enabled, provider.base_url,
        ));
    }
    Ok(output)
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
