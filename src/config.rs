//! Annotation schema and per-HPA policy configuration
//!
//! Annotations are the only place configuration and bookkeeping live. The
//! parse here is pure and total: every field is optional and every malformed
//! value is logged and treated as absent, so one bad annotation on one HPA
//! can never stop the controller from handling the rest.
//!
//! The key prefix is kept compatible with `kubernetes-hpaa`, so HPAs already
//! annotated for it are picked up unchanged.

use std::collections::BTreeMap;
use std::num::{IntErrorKind, ParseIntError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, warn};

/// Prefix shared by every annotation this controller reads or writes
pub const ANNOTATION_PREFIX: &str = "rebuy.com/kubernetes-hpaa.";

/// Hard floor for `spec.minReplicas`; its absence disables the controller for the HPA
pub const ANNOTATION_LOWER_REPLICA_LIMIT: &str = "rebuy.com/kubernetes-hpaa.lower-replica-limit";

/// Minimum time between two downward floor adjustments (e.g. `5m`)
pub const ANNOTATION_DOWNSCALE_COOLDOWN: &str = "rebuy.com/kubernetes-hpaa.downscale-cooldown";

/// RFC 3339 timestamp of the last floor change made by this controller
pub const ANNOTATION_LAST_CHANGE: &str = "rebuy.com/kubernetes-hpaa.last-change";

/// Typed view of the controller's annotations on one HPA
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Floor below which `spec.minReplicas` is never lowered
    pub lower_replica_limit: Option<i32>,
    /// Cooldown between downward adjustments
    pub downscale_cooldown: Option<Duration>,
    /// When this controller last changed the floor
    pub last_change: Option<DateTime<Utc>>,
}

impl PolicyConfig {
    /// Parse the controller's annotations out of an HPA's annotation map.
    ///
    /// Never fails. Unknown keys are ignored; malformed values are logged and
    /// come back as `None`.
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> Self {
        let lower_replica_limit = annotations
            .get(ANNOTATION_LOWER_REPLICA_LIMIT)
            .and_then(|raw| match parse_replica_limit(raw) {
                Ok(limit) => Some(limit),
                Err(e) => {
                    error!(
                        annotation = ANNOTATION_LOWER_REPLICA_LIMIT,
                        value = %raw,
                        error = %e,
                        "ignoring malformed lower replica limit"
                    );
                    None
                }
            });

        let downscale_cooldown =
            annotations
                .get(ANNOTATION_DOWNSCALE_COOLDOWN)
                .and_then(|raw| match parse_duration(raw) {
                    Ok(cooldown) => Some(cooldown),
                    Err(e) => {
                        warn!(
                            annotation = ANNOTATION_DOWNSCALE_COOLDOWN,
                            value = %raw,
                            error = %e,
                            "ignoring malformed downscale cooldown"
                        );
                        None
                    }
                });

        let last_change = annotations
            .get(ANNOTATION_LAST_CHANGE)
            .and_then(|raw| match DateTime::parse_from_rfc3339(raw.trim()) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(e) => {
                    error!(
                        annotation = ANNOTATION_LAST_CHANGE,
                        value = %raw,
                        error = %e,
                        "ignoring malformed last-change timestamp"
                    );
                    None
                }
            });

        Self {
            lower_replica_limit,
            downscale_cooldown,
            last_change,
        }
    }
}

/// Why an annotation value could not be parsed
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Value was empty or whitespace only
    #[error("empty value")]
    Empty,
    /// Value is not a number where one was expected
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    /// Value is negative where only non-negative values make sense
    #[error("negative value `{0}`")]
    Negative(String),
    /// A duration component has no unit (`5` instead of `5m`)
    #[error("missing unit in duration `{0}`")]
    MissingUnit(String),
    /// A duration component has a unit we don't know
    #[error("unknown unit `{unit}` in duration `{value}`")]
    UnknownUnit {
        /// The offending unit
        unit: String,
        /// The whole input
        value: String,
    },
    /// Value does not fit the target type
    #[error("value `{0}` out of range")]
    OutOfRange(String),
}

/// Parse a non-negative replica count.
pub fn parse_replica_limit(raw: &str) -> Result<i32, ParseError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(ParseError::Empty);
    }
    let n: i32 = s.parse().map_err(|e: ParseIntError| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            ParseError::OutOfRange(s.to_string())
        }
        _ => ParseError::InvalidNumber(s.to_string()),
    })?;
    if n < 0 {
        return Err(ParseError::Negative(s.to_string()));
    }
    Ok(n)
}

/// Parse a duration string such as `5m`, `1h30m`, `1.5h` or `300ms`.
///
/// Accepts a sequence of decimal numbers, each with an optional fraction and
/// a mandatory unit: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. The bare
/// string `0` is zero. Negative durations are rejected since a negative
/// cooldown has no meaning.
pub fn parse_duration(raw: &str) -> Result<Duration, ParseError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ParseError::Empty);
    }
    if value.starts_with('-') {
        return Err(ParseError::Negative(value.to_string()));
    }
    let body = value.strip_prefix('+').unwrap_or(value);
    if body == "0" {
        return Ok(Duration::ZERO);
    }
    if body.is_empty() {
        return Err(ParseError::InvalidNumber(value.to_string()));
    }

    let is_numeric = |c: char| c.is_ascii_digit() || c == '.';
    let mut rest = body;
    let mut total_nanos: u128 = 0;

    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !is_numeric(c)).unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail.find(is_numeric).unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            "" => return Err(ParseError::MissingUnit(value.to_string())),
            other => {
                return Err(ParseError::UnknownUnit {
                    unit: other.to_string(),
                    value: value.to_string(),
                })
            }
        };

        total_nanos = total_nanos
            .checked_add(component_nanos(number, scale, value)?)
            .ok_or_else(|| ParseError::OutOfRange(value.to_string()))?;
        rest = tail;
    }

    let nanos = u64::try_from(total_nanos).map_err(|_| ParseError::OutOfRange(value.to_string()))?;
    Ok(Duration::from_nanos(nanos))
}

/// Nanoseconds for one `<number><unit>` component, `number` possibly fractional.
fn component_nanos(number: &str, scale: u128, value: &str) -> Result<u128, ParseError> {
    let invalid = || ParseError::InvalidNumber(value.to_string());
    let out_of_range = || ParseError::OutOfRange(value.to_string());

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return Err(invalid());
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| out_of_range())?
    };
    let mut nanos = whole.checked_mul(scale).ok_or_else(out_of_range)?;

    // Digits past nanosecond resolution of the largest unit cannot matter
    let fraction = &fraction[..fraction.len().min(18)];
    if !fraction.is_empty() {
        let digits: u128 = fraction.parse().map_err(|_| invalid())?;
        let divisor = 10u128.pow(fraction.len() as u32);
        nanos = nanos
            .checked_add(digits * scale / divisor)
            .ok_or_else(out_of_range)?;
    }

    Ok(nanos)
}
