//! Wrapper settings.
//!
//! Every command-line argument belongs to the crawler, so the wrapper's own knobs are read
//! from the environment instead of flags.

use crate::classify::DEFAULT_PROGRESS_BAR_WIDTH;
use crate::model::CommandLine;
use serde::{Deserialize, Serialize};

pub const INTERPRETER_VAR: &str = "PCRAW_INTERPRETER";
pub const SCRIPT_VAR: &str = "PCRAW_SCRIPT";
pub const CLEAR_WIDTH_VAR: &str = "PCRAW_CLEAR_WIDTH";
pub const SUMMARY_VAR: &str = "PCRAW_SUMMARY";
/// Tracing filter directive, read by the binary when installing the subscriber.
pub const LOG_VAR: &str = "PCRAW_LOG";

pub const DEFAULT_INTERPRETER: &str = "perl";
pub const DEFAULT_SCRIPT: &str = "pcraw.pl";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must not be empty")]
    Empty { var: &'static str },

    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidWidth { var: &'static str, value: String },

    #[error("{var} must be `json` or `off`, got {value:?}")]
    InvalidSummary { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFormat {
    #[default]
    Off,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub interpreter: String,
    pub script: String,
    /// Width of the blank line the crawler uses to wipe its progress row.
    pub clear_width: usize,
    #[serde(default)]
    pub summary: SummaryFormat,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            script: DEFAULT_SCRIPT.to_string(),
            clear_width: DEFAULT_PROGRESS_BAR_WIDTH,
            summary: SummaryFormat::Off,
        }
    }
}

impl RunConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable source; unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup(INTERPRETER_VAR) {
            cfg.interpreter = non_empty(INTERPRETER_VAR, v)?;
        }
        if let Some(v) = lookup(SCRIPT_VAR) {
            cfg.script = non_empty(SCRIPT_VAR, v)?;
        }
        if let Some(v) = lookup(CLEAR_WIDTH_VAR) {
            cfg.clear_width = match v.trim().parse::<usize>() {
                Ok(w) if w > 0 => w,
                _ => {
                    return Err(ConfigError::InvalidWidth {
                        var: CLEAR_WIDTH_VAR,
                        value: v,
                    })
                }
            };
        }
        if let Some(v) = lookup(SUMMARY_VAR) {
            cfg.summary = match v.trim().to_ascii_lowercase().as_str() {
                "" | "off" | "0" | "false" => SummaryFormat::Off,
                "json" => SummaryFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidSummary {
                        var: SUMMARY_VAR,
                        value: v,
                    })
                }
            };
        }

        Ok(cfg)
    }

    /// Crawler invocation for the given passthrough arguments.
    pub fn command_line<I, S>(&self, passthrough: I) -> CommandLine
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine::new(self.interpreter.clone(), self.script.clone(), passthrough)
    }
}

fn non_empty(var: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Empty { var })
    } else {
        Ok(value)
    }
}
