//! Providers command implementation.

use crate::cli::args::Cli;
use crate::core::models::ProviderInfo;
use crate::core::provider::Provider;
use crate::error::Result;
use crate::render;
use crate::storage::{ProvidersConfig, ResolvedConfig};

/// Execute the providers command.
pub fn execute(cli: &Cli) -> Result<()> {
    let config = ResolvedConfig::resolve(cli, None)?;
    let infos = provider_infos(&config.file.providers);
    let output = render::render_providers(&infos, config.format, config.pretty, config.no_color)?;
    print!("{output}");
    Ok(())
}

/// One row per supported provider, with config overrides applied.
#[must_use]
pub fn provider_infos(config: &ProvidersConfig) -> Vec<ProviderInfo> {
    Provider::ALL
        .iter()
        .map(|&p| ProviderInfo {
            name: p.cli_name().to_string(),
            display_name: p.display_name().to_string(),
            base_url: config.base_url(p),
            credential: p.credential_kind().account_field().to_string(),
            browser: p.requires_browser(),
            enabled: config.is_enabled(p),
        })
        .collect()
}
