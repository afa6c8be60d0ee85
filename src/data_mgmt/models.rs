use std::fmt;

use chrono::{DateTime, offset::Utc};
use serde::Serialize;

use crate::data_mgmt::bitfield;

/// Typed value of a register, a derived sensor, or a write request
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RtValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Active conditions of an alarm or fault group
    Flags(Vec<&'static str>),
}

impl RtValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RtValue::Int(i) => Some(*i as f64),
            RtValue::Float(f) => Some(*f),
            RtValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RtValue::None)
    }
}

impl fmt::Display for RtValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtValue::None => f.write_str("unavailable"),
            RtValue::Bool(b) => write!(f, "{}", if *b { "on" } else { "off" }),
            RtValue::Int(i) => write!(f, "{}", i),
            RtValue::Float(v) => write!(f, "{}", v),
            RtValue::String(s) => f.write_str(s),
            RtValue::Flags(active) => f.write_str(&bitfield::describe(active)),
        }
    }
}

/// Parse a host-supplied value: bool, integer, float, then plain text
impl From<&str> for RtValue {
    fn from(s: &str) -> Self {
        match s {
            "true" | "on" => return RtValue::Bool(true),
            "false" | "off" => return RtValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = s.parse::<i64>() {
            RtValue::Int(i)
        } else if let Ok(f) = s.parse::<f64>() {
            RtValue::Float(f)
        } else {
            RtValue::String(s.to_string())
        }
    }
}

/// Result of one successful read; never mutated once produced
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedValue {
    pub key: &'static str,
    pub raw_words: Vec<u16>,
    pub value: RtValue,
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
}

/// One entry of the decoded-value feed
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Reading {
    pub key: &'static str,
    pub state: RtValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    pub timestamp: Option<DateTime<Utc>>,
    pub available: bool,
    /// State is an optimistic echo of a write not yet confirmed by a poll
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub readings: Vec<Reading>,
}

impl Snapshot {
    pub fn get(&self, key: &str) -> Option<&Reading> {
        self.readings.iter().find(|r| r.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_values() {
        assert_eq!(RtValue::from("on"), RtValue::Bool(true));
        assert_eq!(RtValue::from("false"), RtValue::Bool(false));
        assert_eq!(RtValue::from("80"), RtValue::Int(80));
        assert_eq!(RtValue::from("95.5"), RtValue::Float(95.5));
        assert_eq!(
            RtValue::from("Discharge"),
            RtValue::String("Discharge".to_string())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(RtValue::None.to_string(), "unavailable");
        assert_eq!(RtValue::Float(52.3).to_string(), "52.3");
        assert_eq!(RtValue::Flags(vec![]).to_string(), "None");
        assert_eq!(
            RtValue::Flags(vec!["Grid Overvoltage", "BAT low SOC"]).to_string(),
            "Grid Overvoltage, BAT low SOC"
        );
    }

    #[test]
    fn test_reading_serialization_skips_empty_fields() {
        let reading = Reading {
            key: "battery_soc",
            state: RtValue::Int(62),
            unit: None,
            timestamp: None,
            available: true,
            pending: false,
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"key": "battery_soc", "state": 62, "timestamp": null, "available": true})
        );
    }
}
