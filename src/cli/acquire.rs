//! Acquire command implementation.

use crate::cli::args::{AcquireArgs, Cli};
use crate::core::models::AcquisitionReport;
use crate::core::pipeline::{RunContext, acquire_all, failed_count};
use crate::error::{CdkError, Result};
use crate::render;
use crate::storage::{AccountStore, ResolvedConfig};

/// Execute the acquire command.
///
/// Reports are printed before a partial failure is returned, so collected
/// codes always reach stdout.
pub async fn execute(cli: &Cli, args: &AcquireArgs) -> Result<()> {
    args.validate()?;
    let config = ResolvedConfig::resolve(cli, Some(args))?;
    let (format, pretty, no_color) = (config.format, config.pretty, config.no_color);

    let reports = run(config, args.account.as_deref()).await?;
    let output = render::render_acquire(&reports, format, pretty, no_color)?;
    print!("{output}");

    match failed_count(&reports) {
        0 => Ok(()),
        failed => Err(CdkError::PartialFailure { failed }),
    }
}

/// Load accounts and run every planned pair.
pub async fn run(config: ResolvedConfig, account: Option<&str>) -> Result<Vec<AcquisitionReport>> {
    let store = AccountStore::load_from(&config.accounts_file)?;
    let accounts = store.select(account)?;
    tracing::debug!(
        accounts = accounts.len(),
        providers = ?config.providers,
        source = %config.sources.providers,
        "Resolved acquisition scope"
    );

    let ctx = RunContext::from_config(config);
    Ok(acquire_all(&ctx, &accounts).await)
}
