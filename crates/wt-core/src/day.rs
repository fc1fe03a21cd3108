//! Local calendar day keys and midnight splitting.
//!
//! A [`DayKey`] is a calendar date in some time zone, rendered as
//! `YYYY-MM-DD`. Because the rendering is zero-padded, string order and
//! chronological order agree, but all arithmetic goes through
//! [`chrono::NaiveDate`].

use std::fmt;
use std::str::FromStr;

use chrono::{LocalResult, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// A string could not be parsed as a canonical day key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid day key {value:?}, expected YYYY-MM-DD")]
pub struct DayKeyError {
    value: String,
}

/// Local calendar date identifying one time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub const fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub const fn date(self) -> NaiveDate {
        self.0
    }

    /// Returns the day containing `epoch_ms` in the given time zone.
    pub fn from_epoch_ms<Tz: TimeZone>(epoch_ms: i64, tz: &Tz) -> Option<Self> {
        tz.timestamp_millis_opt(epoch_ms)
            .single()
            .map(|dt| Self(dt.date_naive()))
    }

    /// Returns the epoch milliseconds of the local midnight starting this day.
    ///
    /// On a DST fold the earlier instant wins. If midnight falls in a DST gap,
    /// 01:00 local is used instead.
    pub fn start_epoch_ms<Tz: TimeZone>(self, tz: &Tz) -> Option<i64> {
        let midnight = self.0.and_time(NaiveTime::MIN);
        match tz.from_local_datetime(&midnight) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt.timestamp_millis()),
            LocalResult::None => {
                let one_am = self.0.and_hms_opt(1, 0, 0)?;
                tz.from_local_datetime(&one_am)
                    .earliest()
                    .map(|dt| dt.timestamp_millis())
            }
        }
    }

    /// Calendar days from `self` to `other`; positive when `other` is later.
    pub fn days_until(self, other: Self) -> i64 {
        (other.0 - self.0).num_days()
    }

    /// The following calendar day.
    pub fn succ(self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = DayKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DayKeyError {
            value: s.to_string(),
        };
        let date = NaiveDate::parse_from_str(s, DAY_KEY_FORMAT).map_err(|_| invalid())?;
        let key = Self(date);
        // Reject unpadded forms like 2024-1-5 so keys stay canonical.
        if key.to_string() != s {
            return Err(invalid());
        }
        Ok(key)
    }
}

impl TryFrom<String> for DayKey {
    type Error = DayKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayKey> for String {
    fn from(key: DayKey) -> Self {
        key.to_string()
    }
}

/// Splits the half-open interval `[start_ms, end_ms)` at every local midnight.
///
/// Each piece is credited to the day it falls in. Pieces are positive and sum
/// to `end_ms - start_ms`. Whatever cannot be placed on an earlier day goes to
/// the day of `end_ms`. Empty if either end is outside the representable
/// calendar range.
pub fn split_interval<Tz: TimeZone>(start_ms: i64, end_ms: i64, tz: &Tz) -> Vec<(DayKey, i64)> {
    let mut pieces = Vec::new();
    if end_ms <= start_ms {
        return pieces;
    }
    let (Some(_), Some(end_day)) = (
        DayKey::from_epoch_ms(start_ms, tz),
        DayKey::from_epoch_ms(end_ms, tz),
    ) else {
        return pieces;
    };

    let mut cursor = start_ms;
    while let Some(day) = DayKey::from_epoch_ms(cursor, tz) {
        if day >= end_day {
            break;
        }
        let boundary = day
            .succ()
            .and_then(|next| next.start_epoch_ms(tz))
            .filter(|&boundary| boundary > cursor && boundary < end_ms);
        let Some(boundary) = boundary else {
            break;
        };
        pieces.push((day, boundary - cursor));
        cursor = boundary;
    }

    pieces.push((end_day, end_ms - cursor));
    pieces
}
