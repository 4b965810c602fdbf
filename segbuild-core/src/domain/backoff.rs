//! Webhook retry backoff policies
//!
//! A policy describes how long the delivery worker waits between
//! successive webhook delivery attempts. Policies are persisted as a
//! single string field, so this module also owns the codec between the
//! structured form and the canonical encoding:
//!
//! ```text
//! exponential:<factor>,<minSec>,<maxSec>
//! fixed:<seconds>
//! linear:<baseSec>,<stepSec>,<maxSec>
//! <anything else>          (custom, passed through unvalidated)
//! ```
//!
//! Decoding is total: malformed input never fails, it either falls back
//! to per-field defaults (known prefixes) or becomes a custom policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Canonical encoding used when no usable policy is configured
pub const DEFAULT_ENCODED: &str = "exponential:2,60,3600";

const DEFAULT_FACTOR: u64 = 2;
const DEFAULT_MIN_SECONDS: u64 = 60;
const DEFAULT_MAX_SECONDS: u64 = 3600;
const DEFAULT_FIXED_SECONDS: u64 = 60;
const DEFAULT_BASE_SECONDS: u64 = 60;
const DEFAULT_STEP_SECONDS: u64 = 60;

/// Retry backoff policy
///
/// Numeric fields are `u64`, so non-negativity holds by construction;
/// `factor` is additionally clamped to at least 1 on encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// Delay multiplies by `factor` each attempt, clamped to
    /// `[min_seconds, max_seconds]`
    Exponential {
        factor: u64,
        min_seconds: u64,
        max_seconds: u64,
    },
    /// Constant delay
    Fixed { seconds: u64 },
    /// Delay grows by `step_seconds` each attempt starting at
    /// `base_seconds`, capped at `max_seconds`
    Linear {
        base_seconds: u64,
        step_seconds: u64,
        max_seconds: u64,
    },
    /// Escape hatch: any string not matching the known grammars,
    /// passed through unvalidated
    Custom { raw: String },
}

impl BackoffPolicy {
    /// Encodes the policy into its canonical string form
    ///
    /// Structured modes always emit a valid numeric range; an empty
    /// custom policy encodes as [`DEFAULT_ENCODED`] so the stored field
    /// is never blank.
    pub fn encode(&self) -> String {
        match self {
            Self::Exponential {
                factor,
                min_seconds,
                max_seconds,
            } => format!(
                "exponential:{},{},{}",
                (*factor).max(1),
                min_seconds,
                max_seconds
            ),
            Self::Fixed { seconds } => format!("fixed:{seconds}"),
            Self::Linear {
                base_seconds,
                step_seconds,
                max_seconds,
            } => format!("linear:{base_seconds},{step_seconds},{max_seconds}"),
            Self::Custom { raw } => {
                if raw.is_empty() {
                    DEFAULT_ENCODED.to_string()
                } else {
                    raw.clone()
                }
            }
        }
    }

    /// Decodes a stored policy string
    ///
    /// Total: never fails. Known prefixes fall back to positional
    /// defaults for any missing or unparsable field; everything else
    /// (including the empty string) becomes a custom policy carrying
    /// the input verbatim.
    pub fn decode(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix("exponential:") {
            let mut fields = rest.splitn(3, ',');
            Self::Exponential {
                factor: parse_field(fields.next(), DEFAULT_FACTOR),
                min_seconds: parse_field(fields.next(), DEFAULT_MIN_SECONDS),
                max_seconds: parse_field(fields.next(), DEFAULT_MAX_SECONDS),
            }
        } else if let Some(rest) = raw.strip_prefix("fixed:") {
            Self::Fixed {
                seconds: parse_field(Some(rest), DEFAULT_FIXED_SECONDS),
            }
        } else if let Some(rest) = raw.strip_prefix("linear:") {
            let mut fields = rest.splitn(3, ',');
            Self::Linear {
                base_seconds: parse_field(fields.next(), DEFAULT_BASE_SECONDS),
                step_seconds: parse_field(fields.next(), DEFAULT_STEP_SECONDS),
                max_seconds: parse_field(fields.next(), DEFAULT_MAX_SECONDS),
            }
        } else {
            Self::Custom {
                raw: raw.to_string(),
            }
        }
    }

    /// Delay before the given retry attempt (0-based)
    ///
    /// Returns `None` for custom policies, whose schedule is owned by
    /// whatever consumes the raw string. All arithmetic saturates.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        let seconds = match self {
            Self::Exponential {
                factor,
                min_seconds,
                max_seconds,
            } => {
                let factor = (*factor).max(1);
                let delay = min_seconds.saturating_mul(factor.saturating_pow(attempt));
                clamp(delay, *min_seconds, *max_seconds)
            }
            Self::Fixed { seconds } => *seconds,
            Self::Linear {
                base_seconds,
                step_seconds,
                max_seconds,
            } => {
                let delay = base_seconds.saturating_add(step_seconds.saturating_mul(attempt as u64));
                clamp(delay, *base_seconds, *max_seconds)
            }
            Self::Custom { .. } => return None,
        };
        Some(Duration::from_secs(seconds))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Exponential {
            factor: DEFAULT_FACTOR,
            min_seconds: DEFAULT_MIN_SECONDS,
            max_seconds: DEFAULT_MAX_SECONDS,
        }
    }
}

fn parse_field(field: Option<&str>, default: u64) -> u64 {
    field
        .and_then(|f| f.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

/// Clamp that tolerates an inverted range (lo > hi wins)
fn clamp(value: u64, lo: u64, hi: u64) -> u64 {
    value.max(lo).min(hi.max(lo))
}
