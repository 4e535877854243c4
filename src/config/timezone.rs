//! Timezone resolution for entry timestamps.
//!
//! Accepts either an IANA name (`Asia/Tokyo`) or a fixed offset written as
//! `NAME ±HH:MM` (`JST +09:00`).

use super::ConfigError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::{str::FromStr, sync::LazyLock};

static FIXED_OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+([+-])(\d{1,2}):(\d{2})$").unwrap()
});

#[derive(Debug, Clone, PartialEq)]
pub enum Timezone {
    Named(Tz),
    Fixed { name: String, offset: FixedOffset },
}

impl Default for Timezone {
    fn default() -> Self {
        Self::Named(chrono_tz::UTC)
    }
}

impl FromStr for Timezone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(tz) = s.parse::<Tz>() {
            return Ok(Self::Named(tz));
        }

        let invalid = || ConfigError::Timezone(s.to_owned());
        let caps = FIXED_OFFSET.captures(s).ok_or_else(invalid)?;
        let hours: i32 = caps[3].parse().map_err(|_| invalid())?;
        let minutes: i32 = caps[4].parse().map_err(|_| invalid())?;
        if minutes >= 60 {
            return Err(invalid());
        }

        let seconds = (hours * 3600 + minutes * 60) * if &caps[2] == "-" { -1 } else { 1 };
        let offset = FixedOffset::east_opt(seconds).ok_or_else(invalid)?;
        Ok(Self::Fixed {
            name: caps[1].to_owned(),
            offset,
        })
    }
}

impl Timezone {
    /// Interpret a wall-clock time in this zone.
    ///
    /// Returns the resolved instant and the zone abbreviation, or `None` when the
    /// wall-clock time does not exist (DST gap). Ambiguous times take the earliest.
    pub fn localize(&self, naive: NaiveDateTime) -> Option<(DateTime<FixedOffset>, String)> {
        match self {
            Self::Named(tz) => {
                let local = tz.from_local_datetime(&naive).earliest()?;
                Some((local.fixed_offset(), local.format("%Z").to_string()))
            }
            Self::Fixed { name, offset } => {
                let local = offset.from_local_datetime(&naive).single()?;
                Some((local, name.clone()))
            }
        }
    }

    /// Current wall-clock time in this zone.
    pub fn now(&self) -> NaiveDateTime {
        let now = Utc::now();
        match self {
            Self::Named(tz) => now.with_timezone(tz).naive_local(),
            Self::Fixed { offset, .. } => now.with_timezone(offset).naive_local(),
        }
    }
}
