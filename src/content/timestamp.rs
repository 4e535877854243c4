//! Zone-aware timestamps carried by entries.

use crate::config::Timezone;
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDateTime, Timelike, Utc,
    format::{Item, StrftimeItems},
};
use std::{cmp::Ordering, fmt};

/// Layout of `posted_at` / `updated_at` header values
pub const HEADER_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An instant plus the zone abbreviation it was written in.
///
/// Ordering and equality consider the instant only.
#[derive(Debug, Clone)]
pub struct Timestamp {
    time: DateTime<FixedOffset>,
    zone: String,
}

impl Timestamp {
    pub fn new(time: DateTime<FixedOffset>, zone: impl Into<String>) -> Self {
        Self {
            time,
            zone: zone.into(),
        }
    }

    /// Parse a header value as wall-clock time in `tz`.
    pub fn parse(value: &str, tz: &Timezone) -> Option<Self> {
        let naive = NaiveDateTime::parse_from_str(value.trim(), HEADER_FORMAT).ok()?;
        let (time, zone) = tz.localize(naive)?;
        Some(Self::new(time, zone))
    }

    /// Placeholder for entries that never declared `posted_at`.
    pub fn epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH.fixed_offset(), "UTC")
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn year(&self) -> i32 {
        self.time.year()
    }

    pub fn month(&self) -> u32 {
        self.time.month()
    }

    pub fn day(&self) -> u32 {
        self.time.day()
    }

    pub fn hour(&self) -> u32 {
        self.time.hour()
    }

    pub fn minute(&self) -> u32 {
        self.time.minute()
    }

    pub fn second(&self) -> u32 {
        self.time.second()
    }

    /// Offset from UTC in seconds.
    pub fn offset_seconds(&self) -> i32 {
        self.time.offset().local_minus_utc()
    }

    pub fn unix(&self) -> i64 {
        self.time.timestamp()
    }

    pub fn rfc3339(&self) -> String {
        self.time.to_rfc3339()
    }

    /// strftime-style formatting; `%Z` prints the zone abbreviation.
    ///
    /// Returns `None` for an invalid layout.
    pub fn format(&self, layout: &str) -> Option<String> {
        let layout = layout.replace("%Z", &self.zone);
        let items: Vec<Item<'_>> = StrftimeItems::new(&layout).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return None;
        }
        Some(self.time.format_with_items(items.into_iter()).to_string())
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time.format(HEADER_FORMAT))
    }
}
