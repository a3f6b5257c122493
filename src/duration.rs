// src/duration.rs - Compact duration literals ("1d12h", "90s", "")
use crate::error::{AlarmError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$")
        .expect("duration pattern is a valid regex")
});

const UNIT_SECONDS: [u64; 4] = [86_400, 3_600, 60, 1];

/// Parse a duration literal made of optional `d`, `h`, `m` and `s` tokens.
///
/// Tokens appear at most once each, in that order, with no separators.
/// An empty literal is a zero duration. Anything else, including a token
/// whose value overflows, is a [`AlarmError::DurationFormat`].
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use threshold_alarm::parse_duration;
///
/// assert_eq!(parse_duration("1d2h3m4s")?, Duration::from_secs(93_784));
/// assert_eq!(parse_duration("")?, Duration::ZERO);
/// assert!(parse_duration("5x").is_err());
/// # Ok::<(), threshold_alarm::AlarmError>(())
/// ```
pub fn parse_duration(literal: &str) -> Result<Duration> {
    let trimmed = literal.trim();
    let captures = DURATION_PATTERN
        .captures(trimmed)
        .ok_or_else(|| AlarmError::DurationFormat(literal.to_string()))?;

    let mut total: u64 = 0;
    for (index, unit) in UNIT_SECONDS.iter().enumerate() {
        let Some(token) = captures.get(index + 1) else {
            continue;
        };
        let seconds = token
            .as_str()
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(*unit))
            .and_then(|s| total.checked_add(s))
            .ok_or_else(|| AlarmError::DurationFormat(literal.to_string()))?;
        total = seconds;
    }

    Ok(Duration::from_secs(total))
}

/// Render a duration back into the literal form, `"0s"` for zero.
///
/// Sub-second precision is dropped.
pub fn format_duration(duration: Duration) -> String {
    let mut remaining = duration.as_secs();
    if remaining == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, suffix) in UNIT_SECONDS.iter().zip(['d', 'h', 'm', 's']) {
        let count = remaining / unit;
        if count > 0 {
            out.push_str(&count.to_string());
            out.push(suffix);
            remaining %= unit;
        }
    }
    out
}
