//! Per-task outcome contract.
//!
//! Each scraper subprocess prints exactly one outcome line to stdout,
//! bracketed by separator lines, regardless of what happened inside.
//! Failure is conveyed by the message tag, not the exit code, so a
//! subprocess that crashed half-way still produces a well-defined
//! (Failed) outcome on the orchestrator side.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ScrapeTask;

/// Separator bracketing the outcome line on stdout.
pub const OUTCOME_SEPARATOR: &str =
    "==================================================";

const SUCCESS_TAG: &str = "✅";
const WARNING_TAG: &str = "⚠️";
const FAILURE_TAG: &str = "❌";

fn written_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+) new offer").unwrap())
}

fn skipped_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d+) already current\)").unwrap())
}

/// Terminal result of one scrape task.
///
/// `Succeeded` covers the all-duplicate rerun as `written == 0`;
/// `Partial` means the task ran to completion but had nothing to write
/// (no sellers, marketplace absent, redirects never resolved); `Failed`
/// is reserved for task-fatal conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    Succeeded {
        written: usize,
        skipped: usize,
        message: String,
    },
    Partial {
        reason: String,
    },
    Failed {
        error: String,
    },
}

impl TaskOutcome {
    /// The single line the subprocess prints between separators.
    pub fn stdout_line(&self) -> String {
        match self {
            TaskOutcome::Succeeded { message, .. } => format!("{} {}", SUCCESS_TAG, message),
            TaskOutcome::Partial { reason } => format!("{} {}", WARNING_TAG, reason),
            TaskOutcome::Failed { error } => format!("{} {}", FAILURE_TAG, error),
        }
    }

    /// Recover an outcome from raw subprocess stdout.
    ///
    /// Scans for the last tagged line so debug noise above the separator
    /// block is tolerated. Counts are recovered from the success message
    /// itself; stdout with no tagged line at all means the subprocess
    /// died before reporting.
    pub fn parse_stdout(raw: &str) -> TaskOutcome {
        let tagged = raw
            .lines()
            .map(str::trim)
            .filter(|line| {
                line.starts_with(SUCCESS_TAG)
                    || line.starts_with(WARNING_TAG)
                    || line.starts_with(FAILURE_TAG)
            })
            .next_back();

        match tagged {
            Some(line) if line.starts_with(SUCCESS_TAG) => {
                let message = line.trim_start_matches(SUCCESS_TAG).trim().to_string();
                let written = capture_usize(written_re(), &message);
                let skipped = capture_usize(skipped_re(), &message);
                TaskOutcome::Succeeded {
                    written,
                    skipped,
                    message,
                }
            }
            Some(line) if line.starts_with(WARNING_TAG) => TaskOutcome::Partial {
                reason: line.trim_start_matches(WARNING_TAG).trim().to_string(),
            },
            Some(line) => TaskOutcome::Failed {
                error: line.trim_start_matches(FAILURE_TAG).trim().to_string(),
            },
            None => {
                let chars: Vec<char> = raw.chars().collect();
                let start = chars.len().saturating_sub(200);
                let tail: String = chars[start..].iter().collect();
                TaskOutcome::Failed {
                    error: format!("no outcome line on stdout (tail: {})", tail.trim()),
                }
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed { .. })
    }
}

fn capture_usize(re: &Regex, haystack: &str) -> usize {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// A finished task together with its outcome, in submission order.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: ScrapeTask,
    pub outcome: TaskOutcome,
}
