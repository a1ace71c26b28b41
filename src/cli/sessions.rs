//! Sessions command implementation.

use crate::cli::args::{Cli, SessionsCommand};
use crate::core::models::SessionSummary;
use crate::error::Result;
use crate::render;
use crate::storage::{Account, AccountStore, ResolvedConfig, SessionStore, StoredSession};

/// Execute a sessions subcommand.
pub fn execute(cli: &Cli, command: &SessionsCommand) -> Result<()> {
    let config = ResolvedConfig::resolve(cli, None)?;
    let store = SessionStore::new(config.sessions_dir.clone());

    match command {
        SessionsCommand::List => {
            // Owners are resolved best effort; sessions outlive account edits.
            let accounts = AccountStore::load_from(&config.accounts_file)
                .map(|s| s.accounts().to_vec())
                .unwrap_or_default();
            let summaries = summarize(&store.list()?, &accounts);
            let output =
                render::render_sessions(&summaries, config.format, config.pretty, config.no_color)?;
            print!("{output}");
        }
        SessionsCommand::Clear { account } => {
            let accounts = AccountStore::load_from(&config.accounts_file)?;
            let account = accounts.find(account)?;
            let identity = account.identity();
            if store.clear(&identity)? {
                tracing::info!(account = %account.name, identity = %identity, "Session cleared");
                println!("Cleared cached session for {} ({identity})", account.name);
            } else {
                println!("No cached session for {} ({identity})", account.name);
            }
        }
    }
    Ok(())
}

/// Pair stored sessions with the accounts that own them.
#[must_use]
pub fn summarize(sessions: &[StoredSession], accounts: &[Account]) -> Vec<SessionSummary> {
    sessions
        .iter()
        .map(|s| SessionSummary {
            identity: s.identity.clone(),
            account: accounts
                .iter()
                .find(|a| a.identity() == s.identity)
                .map(|a| a.name.clone()),
            provider: s.provider.cli_name().to_string(),
            saved_at: s.saved_at,
        })
        .collect()
}
