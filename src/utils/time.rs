// src/utils/time.rs

//! Upstream timestamp parsing.
//!
//! Every parsed value is converted to UTC and truncated to whole seconds.

use chrono::{DateTime, SubsecRound, Utc};

use crate::error::{AppError, Result};

/// Ruby `Time#to_s`-style layout, e.g. `Sat Oct 10 12:34:56 -0500 2020`.
const RUBY_DATE: &str = "%a %b %d %H:%M:%S %z %Y";

/// Parse an RFC 3339 timestamp, fractional seconds allowed.
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AppError::timestamp(s, "missing timestamp"));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc).trunc_subsecs(0))
        .map_err(|e| AppError::timestamp(s, e))
}

/// Parse a Ruby-style textual date.
pub fn parse_ruby_date(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AppError::timestamp(s, "missing timestamp"));
    }
    DateTime::parse_from_str(s, RUBY_DATE)
        .map(|t| t.with_timezone(&Utc).trunc_subsecs(0))
        .map_err(|e| AppError::timestamp(s, e))
}

/// Convert epoch seconds.
pub fn from_epoch(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| AppError::timestamp(secs.to_string(), "out of range"))
}
