//! End-of-run summary for scripting.
//!
//! Printed as JSON on stderr when enabled, after all relayed output.

use crate::model::CommandLine;
use crate::relay::StreamError;
use crate::supervisor::RunReport;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    /// Lines relayed, when the stream drained cleanly.
    pub lines: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<u64, StreamError>> for StreamSummary {
    fn from(outcome: &Result<u64, StreamError>) -> Self {
        match outcome {
            Ok(n) => Self {
                lines: Some(*n),
                error: None,
            },
            Err(e) => Self {
                lines: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub command: Vec<String>,
    pub started_utc: String,
    pub finished_utc: String,
    pub exit_code: i32,
    #[serde(default)]
    pub interrupted: bool,
    pub stdout: StreamSummary,
    pub stderr: StreamSummary,
}

pub fn build_run_summary(
    command: &CommandLine,
    started: OffsetDateTime,
    finished: OffsetDateTime,
    report: &RunReport,
) -> RunSummary {
    RunSummary {
        command: command.argv(),
        started_utc: rfc3339(started),
        finished_utc: rfc3339(finished),
        exit_code: report.exit_code(),
        interrupted: report.interrupted,
        stdout: StreamSummary::from(&report.stdout),
        stderr: StreamSummary::from(&report.stderr),
    }
}

fn rfc3339(t: OffsetDateTime) -> String {
    t.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".into())
}
