//! Conversions between structured times, milliseconds and the `M:SS:mmm` display.

use crate::config::{LeaderboardError, TimeValue};

/// Combines minutes, seconds and milliseconds into a single time.
pub fn to_millis(
    minutes: u64,
    seconds: u64,
    milliseconds: u64,
) -> Result<TimeValue, LeaderboardError> {
    if seconds > 59 {
        return Err(LeaderboardError::Validation {
            field: "seconds",
            reason: format!("expected a value between 0 and 59, got {}", seconds),
        });
    }
    if milliseconds > 999 {
        return Err(LeaderboardError::Validation {
            field: "milliseconds",
            reason: format!("expected a value between 0 and 999, got {}", milliseconds),
        });
    }
    combine(minutes, seconds, milliseconds).ok_or_else(|| LeaderboardError::Validation {
        field: "minutes",
        reason: format!("{} minutes is too large", minutes),
    })
}

fn combine(minutes: u64, seconds: u64, milliseconds: u64) -> Option<TimeValue> {
    minutes
        .checked_mul(60)
        .and_then(|s| s.checked_add(seconds))
        .and_then(|s| s.checked_mul(1000))
        .and_then(|ms| ms.checked_add(milliseconds))
        .map(TimeValue)
}

pub fn format_millis(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    let milliseconds = ms % 1000;
    format!("{}:{:02}:{:03}", minutes, seconds, milliseconds)
}

/// Formats a signed difference of times. Negative values have no display.
pub fn format_signed_millis(ms: i64) -> Result<String, LeaderboardError> {
    u64::try_from(ms)
        .map(format_millis)
        .map_err(|_| LeaderboardError::Format {
            reason: format!("{} is not a non-negative number of milliseconds", ms),
        })
}

/// Reads a time displayed as `M:SS:mmm`.
pub fn parse_time(display: &str) -> Result<TimeValue, LeaderboardError> {
    let parse_error = |reason: String| LeaderboardError::Parse {
        input: display.to_string(),
        reason,
    };
    let segments: Vec<&str> = display.trim().split(':').collect();
    if segments.len() != 3 {
        return Err(parse_error(format!(
            "expected 3 segments separated by ':', found {}",
            segments.len()
        )));
    }
    let mut values: Vec<u64> = Vec::with_capacity(3);
    for segment in segments {
        let v = segment
            .parse::<u64>()
            .map_err(|e| parse_error(format!("segment {:?}: {}", segment, e)))?;
        values.push(v);
    }
    combine(values[0], values[1], values[2])
        .ok_or_else(|| parse_error("the time is too large".to_string()))
}
