//! Serde adapter storing durations as humantime strings (`"30s"`, `"1m 30s"`).

use std::time::Duration;

use humantime::{format_duration, parse_duration};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*value).to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(DeError::custom)
}
