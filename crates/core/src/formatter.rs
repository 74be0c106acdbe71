//! Closed registry of value formatters that export maps may name by key.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::CoreError;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    /// Epoch seconds or an RFC 3339 string rendered as `YYYY-MM-DD HH:MM:SS` (UTC).
    FormatDatetime,
    /// Byte count rendered as whole mebibytes.
    BytesToMb,
    Lowercase,
    Uppercase,
    Trim,
}

impl Formatter {
    pub fn key(&self) -> &'static str {
        match self {
            Formatter::FormatDatetime => "format_datetime",
            Formatter::BytesToMb => "bytes_to_mb",
            Formatter::Lowercase => "lowercase",
            Formatter::Uppercase => "uppercase",
            Formatter::Trim => "trim",
        }
    }

    /// Apply the formatter. Values of an unexpected shape are returned unchanged.
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            Formatter::FormatDatetime => format_datetime(value).unwrap_or_else(|| value.clone()),
            Formatter::BytesToMb => match value.as_u64() {
                Some(bytes) => Value::from(bytes / 1024 / 1024),
                None => value.clone(),
            },
            Formatter::Lowercase => map_str(value, |s| s.to_lowercase()),
            Formatter::Uppercase => map_str(value, |s| s.to_uppercase()),
            Formatter::Trim => map_str(value, |s| s.trim().to_string()),
        }
    }
}

fn map_str(value: &Value, f: impl Fn(&str) -> String) -> Value {
    match value.as_str() {
        Some(s) => Value::String(f(s)),
        None => value.clone(),
    }
}

fn format_datetime(value: &Value) -> Option<Value> {
    let dt: DateTime<Utc> = match value {
        Value::Number(n) => DateTime::from_timestamp(n.as_i64()?, 0)?,
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(_) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()?
                .and_utc(),
        },
        _ => return None,
    };
    Some(Value::String(dt.format(DATETIME_FORMAT).to_string()))
}

impl FromStr for Formatter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "format_datetime" => Ok(Formatter::FormatDatetime),
            "bytes_to_mb" => Ok(Formatter::BytesToMb),
            "lowercase" => Ok(Formatter::Lowercase),
            "uppercase" => Ok(Formatter::Uppercase),
            "trim" => Ok(Formatter::Trim),
            other => Err(CoreError::UnknownFormatter(other.to_string())),
        }
    }
}

impl std::fmt::Display for Formatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl Serialize for Formatter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for Formatter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        key.parse().map_err(serde::de::Error::custom)
    }
}
