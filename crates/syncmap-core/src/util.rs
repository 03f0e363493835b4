//! Shared utility functions used across multiple modules.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Require a non-empty, trimmed value for `field`.
pub fn require_text(value: impl Into<String>, field: &str) -> Result<String> {
    normalize_text_option(Some(value.into()))
        .ok_or_else(|| Error::InvalidInput(format!("{field} must not be empty")))
}

/// Convert a UTC instant to Unix milliseconds for storage.
pub fn to_unix_millis(instant: &DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

/// Convert stored Unix milliseconds back to a UTC instant.
///
/// Returns `None` when the value is outside chrono's representable range.
pub fn from_unix_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}
