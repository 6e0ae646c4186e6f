//! Classification of videos into shorts and regular uploads by their duration.
//!
//! YouTube reports durations in ISO 8601 form (`PT4M13S`, `P1DT2H`). Anything we cannot turn
//! into a whole number of seconds is classified as [`VideoType::Unknown`] rather than an error:
//! live streams that never ended, premieres and odd legacy uploads all produce such values, and
//! "unknown" is a legitimate answer for them.

use crate::record::VideoType;
use jiff::fmt::temporal::SpanParser;
use jiff::{SpanRelativeTo, Unit};

/// Videos strictly shorter than this many seconds are shorts.
pub const SHORT_THRESHOLD_SECS: u64 = 60;

static PARSER: SpanParser = SpanParser::new();

/// Outcome of [`classify`].
///
/// The seconds are carried by the known variants only, so a record can never hold a duration
/// while being of unknown type (or the other way around).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Short(u64),
    Normal(u64),
    Unknown,
}

impl Classification {
    pub fn seconds(&self) -> Option<u64> {
        match *self {
            Classification::Short(s) | Classification::Normal(s) => Some(s),
            Classification::Unknown => None,
        }
    }

    pub fn video_type(&self) -> VideoType {
        match self {
            Classification::Short(_) => VideoType::Short,
            Classification::Normal(_) => VideoType::Normal,
            Classification::Unknown => VideoType::Unknown,
        }
    }
}

/// Classifies a video by its `contentDetails.duration`.
///
/// Never fails: absent or unparsable durations yield [`Classification::Unknown`].
pub fn classify(duration: Option<&str>) -> Classification {
    match duration.and_then(to_seconds) {
        Some(secs) if secs < SHORT_THRESHOLD_SECS => Classification::Short(secs),
        Some(secs) => Classification::Normal(secs),
        None => Classification::Unknown,
    }
}

/// Converts an ISO 8601 duration into whole seconds, truncating any fractional part.
///
/// Days count as 24 hours and weeks as 7 days. Years and months have no fixed length and are
/// rejected, as are negative durations.
pub fn to_seconds(duration: &str) -> Option<u64> {
    if duration.is_empty() {
        return None;
    }
    let span = match PARSER.parse_span(duration) {
        Ok(span) => span,
        Err(e) => {
            tracing::trace!(duration, error = %e, "unparsable duration");
            return None;
        }
    };
    if span.is_negative() {
        return None;
    }
    let total = match span.total((Unit::Second, SpanRelativeTo::days_are_24_hours())) {
        Ok(total) => total,
        Err(e) => {
            tracing::trace!(duration, error = %e, "duration has no fixed length");
            return None;
        }
    };
    if !total.is_finite() || total < 0.0 {
        return None;
    }
    Some(total.trunc() as u64)
}
