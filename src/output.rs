//! # Output Configuration
//!
//! Controls how the CLI reports: colored, emoji-decorated status lines on a
//! capable terminal, plain bracketed labels everywhere else (CI logs, pipes,
//! `TERM=dumb`).
//!
//! Color is decided once from the `--color` flag and the environment:
//! - `--color=always` / `--color=never` override everything
//! - `NO_COLOR` (any value) or `CLICOLOR=0` disable color
//! - `CLICOLOR_FORCE` (non-empty, not `0`) enables color without a TTY
//! - otherwise the `console` crate's terminal detection decides
//!
//! ```rust,ignore
//! use submodule_sync::output::{emoji, OutputConfig, Status};
//!
//! let output = OutputConfig::from_env_and_flag("auto");
//! println!("{} vendor/lib", output.label(Status::Updated));
//! ```

use std::env;

use console::style;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag
    /// (`always`, `never` or `auto`).
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }

    /// Status label for a report line.
    pub fn label(&self, status: Status) -> String {
        let (emoji_str, plain) = status.symbols();
        if !self.use_color {
            return plain.to_string();
        }
        let styled = match status {
            Status::Ok | Status::Pushed => style(emoji_str).green(),
            Status::Updated | Status::Outdated | Status::Working => style(emoji_str).cyan(),
            Status::Failed => style(emoji_str).red(),
            Status::Warning | Status::Unknown | Status::Info => style(emoji_str).yellow(),
        };
        styled.to_string()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Kinds of report lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Working,
    Ok,
    Updated,
    Outdated,
    Unknown,
    Failed,
    Pushed,
    Warning,
    Info,
}

impl Status {
    fn symbols(self) -> (&'static str, &'static str) {
        match self {
            Status::Working => ("🔄", "[SYNC]"),
            Status::Ok => ("✅", "[OK]"),
            Status::Updated => ("⬆️ ", "[UPDATED]"),
            Status::Outdated => ("🔄", "[OUTDATED]"),
            Status::Unknown => ("❔", "[UNKNOWN]"),
            Status::Failed => ("❌", "[FAILED]"),
            Status::Pushed => ("🚀", "[PUSHED]"),
            Status::Warning => ("⚠️ ", "[WARN]"),
            Status::Info => ("ℹ️ ", "[INFO]"),
        }
    }
}

/// Returns `emoji_str` when colors are enabled, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}
