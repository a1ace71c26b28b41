//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};

/// cdkfetch - Collect daily reward codes from reward platforms.
#[derive(Parser, Debug)]
#[command(name = "cdkfetch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Global flags ===
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect reward codes (default command)
    Acquire(AcquireArgs),

    /// Inspect configured accounts
    #[command(subcommand)]
    Accounts(AccountsCommand),

    /// Inspect or clear cached browser sessions
    #[command(subcommand)]
    Sessions(SessionsCommand),

    /// List supported providers
    Providers,
}

/// Arguments for the `acquire` command.
#[derive(Parser, Debug, Default)]
pub struct AcquireArgs {
    /// Provider to run (name, comma separated list, or "all")
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Only run this account (by name)
    #[arg(long, value_name = "NAME")]
    pub account: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Overall deadline per account and provider, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub deadline: Option<u64>,
}

impl AcquireArgs {
    /// Validate argument combinations.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::CdkError;

        if self.timeout == Some(0) {
            return Err(CdkError::Config(
                "Timeout must be greater than 0 seconds".to_string(),
            ));
        }
        if self.deadline == Some(0) {
            return Err(CdkError::Config(
                "Deadline must be greater than 0 seconds".to_string(),
            ));
        }
        Ok(())
    }
}

/// Account subcommands.
#[derive(Subcommand, Debug)]
pub enum AccountsCommand {
    /// List configured accounts and the providers they can run
    List,
}

/// Session subcommands.
#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    /// List cached sessions
    List,

    /// Delete the cached session of an account
    Clear {
        /// Account name
        #[arg(long, value_name = "NAME")]
        account: String,
    },
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// Markdown output
    Md,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn acquire_args_parse() {
        let cli = Cli::parse_from([
            "cdkfetch",
            "acquire",
            "--provider",
            "x666",
            "--deadline",
            "90",
            "--json",
        ]);
        assert_eq!(cli.effective_format(), OutputFormat::Json);
        match cli.command {
            Some(Commands::Acquire(args)) => {
                assert_eq!(args.provider.as_deref(), Some("x666"));
                assert_eq!(args.deadline, Some(90));
                assert!(args.timeout.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn acquire_args_validate() {
        let args = AcquireArgs {
            timeout: Some(0),
            ..AcquireArgs::default()
        };
        assert!(args.validate().is_err());
        assert!(AcquireArgs::default().validate().is_ok());
    }

    #[test]
    fn sessions_clear_requires_account() {
        assert!(Cli::try_parse_from(["cdkfetch", "sessions", "clear"]).is_err());
        let cli = Cli::try_parse_from(["cdkfetch", "sessions", "clear", "--account", "main"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Sessions(SessionsCommand::Clear { .. }))
        ));
    }
}
