//! Output rendering for human and robot modes.

pub mod error;
pub mod human;
pub mod robot;

use crate::cli::args::OutputFormat;
use crate::core::models::{AccountSummary, AcquisitionReport, ProviderInfo, SessionSummary};
use crate::error::Result;

/// Render acquisition reports.
pub fn render_acquire(
    reports: &[AcquisitionReport],
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => human::render_acquire(reports, no_color),
        OutputFormat::Json => robot::render_acquire_json(reports, pretty),
        OutputFormat::Md => robot::render_acquire_md(reports),
    }
}

/// Render configured accounts.
pub fn render_accounts(
    accounts: &[AccountSummary],
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => human::render_accounts(accounts, no_color),
        OutputFormat::Json => robot::render_accounts_json(accounts, pretty),
        OutputFormat::Md => robot::render_accounts_md(accounts),
    }
}

/// Render cached sessions.
pub fn render_sessions(
    sessions: &[SessionSummary],
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => human::render_sessions(sessions, no_color),
        OutputFormat::Json => robot::render_sessions_json(sessions, pretty),
        OutputFormat::Md => robot::render_sessions_md(sessions),
    }
}

/// Render the provider table.
pub fn render_providers(
    providers: &[ProviderInfo],
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => human::render_providers(providers, no_color),
        OutputFormat::Json => robot::render_providers_json(providers, pretty),
        OutputFormat::Md => robot::render_providers_md(providers),
    }
}
