//! Timestamp wire format of the device video service.
//!
//! The device speaks `YYYY-MM-DD_HH-MM-SSZ`; everything else uses ISO-8601
//! with milliseconds (`YYYY-MM-DDTHH:MM:SS.sssZ`).

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};

const DEVICE_FORMAT: &str = "%Y-%m-%d_%H-%M-%SZ";

/// Formats an instant for the device. Sub-second precision is dropped.
pub fn to_device_time(instant: DateTime<Utc>) -> String {
    instant.format(DEVICE_FORMAT).to_string()
}

pub fn parse_device_time(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, DEVICE_FORMAT)
        .map(|naive| naive.and_utc())
        .with_context(|| format!("invalid device timestamp '{value}'"))
}

pub fn to_iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_iso(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid ISO-8601 timestamp '{value}'"))
}

pub fn iso_to_device(value: &str) -> Result<String> {
    parse_iso(value).map(|instant| to_device_time(instant.trunc_subsecs(0)))
}

pub fn device_to_iso(value: &str) -> Result<String> {
    parse_device_time(value).map(to_iso)
}

/// Serde adapter for fields carried in device format.
pub mod serde_device_time {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_device_time(*instant))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_device_time(&raw).map_err(D::Error::custom)
    }
}
