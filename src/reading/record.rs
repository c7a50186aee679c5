use std::fmt;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// Wire format of `datetime`, as sent by stations and echoed back.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// ISO 8601 spelling of the same instant, also accepted on submission.
pub const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses a submitted `datetime` into a calendar date-time.
///
/// Only the two fixed formats are accepted. Database keywords such as
/// `infinity` or `yesterday` are not date-times a station can send.
pub fn parse_datetime(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, ISO_DATETIME_FORMAT))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ReadingId(pub i64);

impl fmt::Display for ReadingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A validated submission that has not been stored yet.
///
/// `datetime` is kept exactly as submitted; turning it into a calendar
/// date-time is the store's job.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub datetime: String,

    pub site_name: String,

    pub latitude: f64,

    pub longitude: f64,

    pub mpsqa: f64,

    pub temperature: f64, // °C

    pub pressure: f64, // hPa

    pub humidity: f64, // percent
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub id: ReadingId,

    #[serde(rename = "datetime", serialize_with = "serialize_datetime")]
    pub timestamp: NaiveDateTime,

    pub site_name: String,

    pub latitude: f64,

    pub longitude: f64,

    pub mpsqa: f64,

    pub temperature: f64,

    pub pressure: f64,

    pub humidity: f64,
}

impl Reading {
    pub fn from_new(id: ReadingId, timestamp: NaiveDateTime, new: &NewReading) -> Self {
        Self {
            id,
            timestamp,
            site_name: new.site_name.clone(),
            latitude: new.latitude,
            longitude: new.longitude,
            mpsqa: new.mpsqa,
            temperature: new.temperature,
            pressure: new.pressure,
            humidity: new.humidity,
        }
    }

    /// Ordering key for "latest": newest timestamp first, id breaks ties.
    pub fn recency_key(&self) -> (NaiveDateTime, ReadingId) {
        (self.timestamp, self.id)
    }
}

fn serialize_datetime<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&value.format(DATETIME_FORMAT))
}
