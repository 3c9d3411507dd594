//! Synthetic Flight Features
//!
//! Season flag, day period and delay targets derived from the scheduled and
//! actual departure timestamps.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::FeatureError;

/// Delays up to this many minutes (inclusive) count as minor
pub const MINOR_DELAY_THRESHOLD_MINUTES: f64 = 15.0;

/// Yearly high-season windows as ((start month, start day), (end month, end day)), inclusive
pub const HIGH_SEASONS: [((u32, u32), (u32, u32)); 3] = [
    ((12, 15), (3, 3)),
    ((7, 15), (7, 31)),
    ((9, 11), (9, 30)),
];

/// Part of the day a flight is scheduled in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPeriod {
    /// 05:00 - 11:59
    Morning,
    /// 12:00 - 18:59
    Afternoon,
    /// 19:00 - 04:59, crossing midnight
    Night,
}

impl DayPeriod {
    /// All periods in bucket order
    pub const ALL: [DayPeriod; 3] = [DayPeriod::Morning, DayPeriod::Afternoon, DayPeriod::Night];

    /// Bucket bounds as ((start hour, start minute), (end hour, end minute)), inclusive
    pub fn bounds(&self) -> ((u32, u32), (u32, u32)) {
        match self {
            DayPeriod::Morning => ((5, 0), (11, 59)),
            DayPeriod::Afternoon => ((12, 0), (18, 59)),
            DayPeriod::Night => ((19, 0), (4, 59)),
        }
    }

    /// Category label used in encoding maps
    pub fn as_str(&self) -> &'static str {
        match self {
            DayPeriod::Morning => "morning",
            DayPeriod::Afternoon => "afternoon",
            DayPeriod::Night => "night",
        }
    }

    fn contains(&self, minute_of_day: u32) -> bool {
        let ((sh, sm), (eh, em)) = self.bounds();
        let start = sh * 60 + sm;
        let end = eh * 60 + em;
        if start <= end {
            start <= minute_of_day && minute_of_day <= end
        } else {
            // crosses midnight
            minute_of_day >= start || minute_of_day <= end
        }
    }
}

impl fmt::Display for DayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delay target of a flight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Delay {
    /// Actual departure known
    Observed {
        /// Signed delay in minutes (negative = early)
        minutes: f64,
        /// `minutes <= 15`
        is_minor: bool,
    },
    /// Only the scheduled departure is known (inference time)
    NotComputable,
}

impl Delay {
    /// Derive the delay from the scheduled and (optional) actual departure
    pub fn derive(scheduled: NaiveDateTime, actual: Option<NaiveDateTime>) -> Self {
        match actual {
            Some(actual) => {
                let minutes = delay_minutes(scheduled, actual);
                Delay::Observed {
                    minutes,
                    is_minor: is_minor_delay(minutes),
                }
            }
            None => Delay::NotComputable,
        }
    }

    /// Delay in minutes, or an explicit error when it cannot be computed
    pub fn minutes(&self) -> Result<f64, FeatureError> {
        match self {
            Delay::Observed { minutes, .. } => Ok(*minutes),
            Delay::NotComputable => Err(FeatureError::NotComputable("delay_minutes")),
        }
    }

    /// Minor-delay flag, or an explicit error when it cannot be computed
    pub fn is_minor(&self) -> Result<bool, FeatureError> {
        match self {
            Delay::Observed { is_minor, .. } => Ok(*is_minor),
            Delay::NotComputable => Err(FeatureError::NotComputable("is_minor_delay")),
        }
    }
}

/// All synthetic features of one flight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticFeatures {
    pub is_high_season: bool,
    pub day_period: DayPeriod,
    pub delay: Delay,
}

impl SyntheticFeatures {
    /// Compute the synthetic features of a flight
    pub fn compute(scheduled: NaiveDateTime, actual: Option<NaiveDateTime>) -> Self {
        Self {
            is_high_season: is_high_season(scheduled.date()),
            day_period: day_period(scheduled),
            delay: Delay::derive(scheduled, actual),
        }
    }
}

/// Whether the date falls in one of the yearly high-season windows
pub fn is_high_season(date: NaiveDate) -> bool {
    let key = (date.month(), date.day());
    HIGH_SEASONS.iter().any(|&(start, end)| {
        if start <= end {
            start <= key && key <= end
        } else {
            // window wraps the year boundary
            key >= start || key <= end
        }
    })
}

/// Signed difference `actual - scheduled` in minutes
pub fn delay_minutes(scheduled: NaiveDateTime, actual: NaiveDateTime) -> f64 {
    (actual - scheduled).num_seconds() as f64 / 60.0
}

/// Minor delay flag.
///
/// Early and on-time departures are minor as well.
pub fn is_minor_delay(delay_minutes: f64) -> bool {
    delay_minutes <= MINOR_DELAY_THRESHOLD_MINUTES
}

/// Day period of a timestamp, bucketed on hour and minute
pub fn day_period(timestamp: NaiveDateTime) -> DayPeriod {
    let minute_of_day = timestamp.hour() * 60 + timestamp.minute();
    DayPeriod::ALL
        .into_iter()
        .find(|period| period.contains(minute_of_day))
        .unwrap_or(DayPeriod::Night)
}
