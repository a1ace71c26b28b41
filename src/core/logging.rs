//! Diagnostic logging to stderr or a file.
//!
//! Logs never go to stdout, which carries the report. Secrets are never
//! logged; credentials only appear through their redacting `Debug` impls.

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::PathBuf;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_LEVEL_ENV: &str = "CDKFETCH_LOG";
pub const LOG_FORMAT_ENV: &str = "CDKFETCH_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "CDKFETCH_LOG_FILE";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable logs.
    #[default]
    Human,
    /// JSON logs (one event per line).
    Json,
    /// Compact logs (single line, terse).
    Compact,
}

impl LogFormat {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Log level from CLI argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Parse from CLI argument.
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "verbose" | "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "critical" | "crit" => Some(Self::Error),
            _ => None,
        }
    }

    /// Convert to tracing filter string.
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Convert to tracing level.
    #[must_use]
    pub const fn as_tracing_level(self) -> Level {
        match self {
            Self::Trace => Level::TRACE,
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warn => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Merge CLI flags with the `CDKFETCH_LOG*` variables.
    ///
    /// `--log-level` beats `CDKFETCH_LOG`; `-v` raises the default to debug;
    /// `--json-output` forces JSON lines.
    pub fn resolve(
        cli_level: Option<&str>,
        json_output: bool,
        verbose: bool,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Self {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let level = cli_level
            .and_then(LogLevel::from_arg)
            .or_else(|| non_empty(LOG_LEVEL_ENV).and_then(|v| LogLevel::from_arg(&v)))
            .unwrap_or(if verbose { LogLevel::Debug } else { LogLevel::Warn });

        let format = if json_output {
            LogFormat::Json
        } else {
            non_empty(LOG_FORMAT_ENV)
                .and_then(|v| LogFormat::from_arg(&v))
                .unwrap_or_default()
        };

        let file = non_empty(LOG_FILE_ENV).map(|v| PathBuf::from(v.trim()));

        Self {
            level,
            format,
            file,
        }
    }

    /// Filter directive for this crate at the resolved level.
    #[must_use]
    pub fn filter_directive(&self) -> String {
        format!("cdkfetch={}", self.level.as_filter())
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(settings: &LogSettings) {
    let file = settings.file.as_ref().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    let make_writer = |file: Option<&std::fs::File>| -> BoxMakeWriter {
        if let Some(file) = file.and_then(|inner| inner.try_clone().ok()) {
            BoxMakeWriter::new(file)
        } else {
            BoxMakeWriter::new(std::io::stderr)
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.filter_directive()));
    let ansi = file.is_none() && std::io::stderr().is_terminal();
    let writer = make_writer(file.as_ref());

    match settings.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(writer)
                .with_span_events(FmtSpan::CLOSE)
                .try_init()
                .ok();
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .compact()
                .with_ansi(ansi)
                .with_writer(writer)
                .with_target(true)
                .try_init()
                .ok();
        }
        LogFormat::Human => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(ansi)
                .with_writer(writer)
                .with_target(false)
                .without_time()
                .try_init()
                .ok();
        }
    }
}
