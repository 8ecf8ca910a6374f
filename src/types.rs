use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// What happens to the rest of the run when a task fails.
///
/// - `SkipDownstream`: every task that transitively depends on the failed
///   task and has not started yet is skipped. Independent branches keep
///   running (default behaviour).
/// - `HaltRun`: every task that has not started yet is skipped, whether it
///   depends on the failed task or not. Tasks already running are left to
///   finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    SkipDownstream,
    HaltRun,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::SkipDownstream
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "skip_downstream" => Ok(FailurePolicy::SkipDownstream),
            "halt_run" => Ok(FailurePolicy::HaltRun),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"skip_downstream\" or \"halt_run\")"
            )),
        }
    }
}

/// What happens to running tasks when a run is cancelled or hits its deadline.
///
/// Pending tasks are always skipped on cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelMode {
    /// Let running tasks finish and record their real outcome.
    Drain,
    /// Abort running executor calls and record those tasks as failed.
    Abort,
}

impl Default for CancelMode {
    fn default() -> Self {
        CancelMode::Drain
    }
}

impl FromStr for CancelMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drain" => Ok(CancelMode::Drain),
            "abort" => Ok(CancelMode::Abort),
            other => Err(format!(
                "invalid on_cancel: {other} (expected \"drain\" or \"abort\")"
            )),
        }
    }
}

/// Parse a duration string such as `"150ms"`, `"30s"`, `"5m"` or `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
