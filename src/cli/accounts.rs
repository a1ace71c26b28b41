//! Accounts command implementation.

use crate::cli::args::{AccountsCommand, Cli};
use crate::core::models::AccountSummary;
use crate::core::provider::Provider;
use crate::error::Result;
use crate::render;
use crate::storage::{Account, AccountStore, ResolvedConfig};

/// Execute an accounts subcommand.
pub fn execute(cli: &Cli, command: &AccountsCommand) -> Result<()> {
    match command {
        AccountsCommand::List => {
            let config = ResolvedConfig::resolve(cli, None)?;
            let store = AccountStore::load_from(&config.accounts_file)?;
            let summaries: Vec<AccountSummary> = store.accounts().iter().map(summarize).collect();
            let output =
                render::render_accounts(&summaries, config.format, config.pretty, config.no_color)?;
            print!("{output}");
            Ok(())
        }
    }
}

/// Which providers an account can run and which credentials it lacks.
#[must_use]
pub fn summarize(account: &Account) -> AccountSummary {
    let (runnable, missing): (Vec<Provider>, Vec<Provider>) = Provider::ALL
        .iter()
        .copied()
        .filter(|p| account.allows(*p))
        .partition(|p| account.has_credentials_for(*p));

    AccountSummary {
        name: account.name.clone(),
        identity: account.identity(),
        has_proxy: account.proxy.is_some(),
        runnable: runnable.iter().map(|p| p.cli_name().to_string()).collect(),
        missing: missing.iter().map(|p| p.cli_name().to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_account;

    #[test]
    fn summary_splits_runnable_and_missing() {
        let mut account = make_account("main");
        account.access_token = Some("tok".to_string());
        account.providers = Some(vec!["x666".to_string(), "b4u".to_string()]);

        let summary = summarize(&account);
        assert_eq!(summary.runnable, ["x666"]);
        assert_eq!(summary.missing, ["b4u"]);
        assert!(!summary.has_proxy);
    }
}
