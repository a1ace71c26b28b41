//! Error rendering for cdkfetch.
//!
//! Styled output with fix suggestions for terminals, plain text otherwise,
//! and structured JSON for `--format json|md`.

use std::io::IsTerminal;

use colored::Colorize;

use crate::cli::args::OutputFormat;
use crate::error::{CdkError, FixSuggestion};

// =============================================================================
// Public API
// =============================================================================

/// Render an error with appropriate formatting based on terminal capabilities.
#[must_use]
pub fn render_error(error: &CdkError, format: OutputFormat, no_color: bool) -> String {
    render_error_full(error, format, no_color, false)
}

/// Render an error with explicit control over JSON pretty printing.
///
/// Styled output is used only for the human format, with color enabled,
/// when stderr is a terminal.
#[must_use]
pub fn render_error_full(
    error: &CdkError,
    format: OutputFormat,
    no_color: bool,
    pretty: bool,
) -> String {
    match format {
        OutputFormat::Json => return render_error_json(error, pretty),
        OutputFormat::Md => return render_error_json(error, true),
        OutputFormat::Human => {}
    }

    if !no_color && std::io::stderr().is_terminal() {
        render_styled(error)
    } else {
        render_simple(error)
    }
}

/// Render error as structured JSON for machine consumption.
#[must_use]
pub fn render_error_json(error: &CdkError, pretty: bool) -> String {
    let error_json = ErrorJson::from_error(error);
    let rendered = if pretty {
        serde_json::to_string_pretty(&error_json)
    } else {
        serde_json::to_string(&error_json)
    };
    rendered.unwrap_or_else(|_| render_simple(error))
}

// =============================================================================
// Styled Terminal Rendering
// =============================================================================

fn render_styled(error: &CdkError) -> String {
    let suggestions = error.fix_suggestions();
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!(
        "{} {}",
        error.category().to_string().red().bold(),
        format!("[{}]", error.error_code()).dimmed()
    ));
    lines.push(format!("  {}", error.to_string().red()));

    if !suggestions.is_empty() {
        lines.push(String::new());
        lines.push(render_suggestions_section(&suggestions));
    }

    if let Some(first) = suggestions.first() {
        if !first.context.is_empty() {
            lines.push(String::new());
            lines.push("Why this happened:".yellow().to_string());
            lines.extend(wrap_text(&first.context, 60).into_iter().map(|l| format!("  {l}")));
        }
        if let Some(prevention) = &first.prevention {
            lines.push(String::new());
            lines.push("Prevention:".green().to_string());
            lines.extend(wrap_text(prevention, 60).into_iter().map(|l| format!("  {l}")));
        }
    }

    lines.join("\n")
}

fn render_suggestions_section(suggestions: &[FixSuggestion]) -> String {
    let mut lines = vec!["How to fix:".bold().to_string()];
    for (i, suggestion) in suggestions.iter().enumerate() {
        for (j, cmd) in suggestion.commands.iter().enumerate() {
            let prefix = if j == 0 {
                format!("  {}. ", i + 1)
            } else {
                "     Or: ".to_string()
            };
            lines.push(format!("{prefix}{}", cmd.cyan()));
        }
    }
    lines.join("\n")
}

// =============================================================================
// Simple Text Rendering
// =============================================================================

/// Render error as plain text (no ANSI codes).
fn render_simple(error: &CdkError) -> String {
    let mut lines = vec![format!("Error [{}]: {}", error.error_code(), error)];

    if let Some(cmd) = error
        .fix_suggestions()
        .first()
        .and_then(|s| s.commands.iter().find(|c| !c.starts_with('#')))
    {
        lines.push(format!("Fix: {cmd}"));
    }

    lines.join("\n")
}

// =============================================================================
// JSON Rendering
// =============================================================================

#[derive(serde::Serialize)]
struct ErrorJson {
    error_code: String,
    category: String,
    message: String,
    is_retryable: bool,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    suggestions: Vec<SuggestionJson>,
}

#[derive(serde::Serialize)]
struct SuggestionJson {
    commands: Vec<String>,
    context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prevention: Option<String>,
}

impl ErrorJson {
    fn from_error(error: &CdkError) -> Self {
        Self {
            error_code: error.error_code().to_string(),
            category: error.category().to_string(),
            message: error.to_string(),
            is_retryable: error.is_retryable(),
            exit_code: error.exit_code().into(),
            provider: error.provider().map(String::from),
            suggestions: error
                .fix_suggestions()
                .into_iter()
                .map(|s| SuggestionJson {
                    commands: s.commands,
                    context: s.context,
                    prevention: s.prevention,
                })
                .collect(),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Greedy word wrap.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_no_ansi(s: &str) {
        assert!(!s.contains("\x1b["), "Contains ANSI codes: {s}");
    }

    fn missing_token() -> CdkError {
        CdkError::CredentialMissing {
            account: "main".to_string(),
            provider: "x666".to_string(),
            credential: "access_token".to_string(),
        }
    }

    #[test]
    fn simple_render_includes_code_and_fix() {
        let output = render_simple(&missing_token());
        assert!(output.contains("CDK-C001"));
        assert!(output.contains("Fix: cdkfetch accounts list"));
        assert_no_ansi(&output);
    }

    #[test]
    fn simple_render_without_suggestions() {
        let output = render_simple(&CdkError::Browser("stale element".to_string()));
        assert_eq!(output, "Error [CDK-E002]: browser error: stale element");
    }

    #[test]
    fn styled_render_has_sections() {
        colored::control::set_override(false);
        let output = render_styled(&missing_token());
        assert!(output.contains("How to fix:"));
        assert!(output.contains("Why this happened:"));
        assert!(output.contains("Prevention:"));
        colored::control::unset_override();
    }

    #[test]
    fn json_render_includes_fields() {
        let output = render_error_json(&missing_token(), true);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["error_code"], "CDK-C001");
        assert_eq!(parsed["category"], "Configuration error");
        assert_eq!(parsed["is_retryable"], false);
        assert_eq!(parsed["exit_code"], 3);
        assert_eq!(parsed["provider"], "x666");
        assert!(parsed["suggestions"].is_array());
    }

    #[test]
    fn json_render_omits_absent_provider() {
        let output = render_error_json(&CdkError::Timeout(30), false);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(parsed.get("provider").is_none());
        assert_eq!(parsed["is_retryable"], true);
    }

    #[test]
    fn format_selection() {
        let err = CdkError::Timeout(30);
        let compact = render_error_full(&err, OutputFormat::Json, false, false);
        assert!(!compact.contains("\n  "));
        let md = render_error(&err, OutputFormat::Md, false);
        assert!(md.contains("\n  "));
        assert_no_ansi(&render_error(&err, OutputFormat::Human, true));
    }

    #[test]
    fn wrap_text_behaviour() {
        assert_eq!(wrap_text("", 60), vec![String::new()]);
        assert_eq!(wrap_text("one two three", 100), vec!["one two three"]);
        for line in wrap_text("a somewhat long line that should be wrapped at width", 20) {
            assert!(line.len() <= 20, "Line too long: {line}");
        }
    }
}
