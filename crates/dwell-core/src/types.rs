//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types and control-plane input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A numeric setting was below its allowed minimum.
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: u64,
        value: u64,
    },

    /// A numeric setting was above its allowed maximum.
    #[error("{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        max: u64,
        value: u64,
    },

    /// A date string could not be parsed.
    #[error("invalid date: {value} (expected YYYY-MM-DD)")]
    InvalidDate { value: String },

    /// A date range ended before it started.
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

/// Identifier of a trackable unit of attention (a browser tab).
///
/// Identifiers are assigned by the host and are never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(u64);

impl SubjectId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Aggregation label for a subject, usually a hostname.
///
/// Resource keys must be non-empty. Subjects whose URL is not known yet are
/// attributed to [`ResourceKey::unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey(String);

impl ResourceKey {
    const UNKNOWN: &'static str = "unknown";

    /// Creates a new key after validation.
    pub fn new(key: impl Into<String>) -> Result<Self, ValidationError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "resource key",
            });
        }
        Ok(Self(key))
    }

    /// The key used when a subject's URL is unavailable.
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// Derives a key from a page URL.
    ///
    /// The hostname is used when the URL has one. URLs without a host (for
    /// example `about:blank`) are kept verbatim; a missing URL maps to
    /// `unknown`.
    pub fn from_url(url: Option<&str>) -> Self {
        let Some(raw) = url.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Self::unknown();
        };
        match url::Url::parse(raw) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) if !host.is_empty() => Self(host.to_string()),
                _ => Self(raw.to_string()),
            },
            Err(_) => Self(raw.to_string()),
        }
    }

    /// Normalizes user input for a per-resource limit.
    ///
    /// Lower-cases the value and strips a leading scheme and `www.` prefix,
    /// so `https://www.Example.com` and `example.com` name the same resource.
    pub fn for_limit(input: &str) -> Result<Self, ValidationError> {
        let lowered = input.trim().to_lowercase();
        let without_scheme = lowered
            .strip_prefix("https://")
            .or_else(|| lowered.strip_prefix("http://"))
            .unwrap_or(&lowered);
        let host = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
        let host = host.trim_end_matches('/');
        Self::new(host)
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the placeholder for subjects without a URL.
    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parses a calendar day.
///
/// Accepts `YYYY-MM-DD` as well as a full RFC 3339 timestamp, which is
/// converted to the local calendar day it falls on.
pub fn parse_day(input: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = input.trim();
    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|parsed| parsed.with_timezone(&Local).date_naive())
        .map_err(|_| ValidationError::InvalidDate {
            value: input.to_string(),
        })
}

/// Parses an inclusive day range, rejecting ranges that end before they start.
pub fn parse_day_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let start = parse_day(start)?;
    let end = parse_day(end)?;
    if start > end {
        return Err(ValidationError::InvertedRange { start, end });
    }
    Ok((start, end))
}
