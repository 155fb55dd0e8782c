//! Heuristic value coercion applied to filter operands.
//!
//! A string operand is tried as a date first, then as a 24-hex-character
//! document id. Anything else, including arrays and objects, passes through
//! untouched. Pattern operators (`contains`, `regex`) never go through here.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::predicate::Operand;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// 12-byte document identifier, written as 24 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a 24 character hex object id: {0}")]
pub struct InvalidObjectId(String);

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 {
            return Err(InvalidObjectId(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidObjectId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses the date shapes clients send in filters. Timestamps without an
/// offset are read as UTC.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Turns a string operand into a date or document id when it reads as one.
///
/// The date check runs first and accepts:
/// - RFC 3339 (`2024-03-01T12:30:00Z`, `2024-03-01T14:30:00+02:00`)
/// - RFC 2822 (`Fri, 01 Mar 2024 12:30:00 +0000`)
/// - `YYYY-MM-DD`, read as midnight UTC
/// - `YYYY-MM-DDTHH:MM[:SS[.fff]]` and `YYYY-MM-DD HH:MM:SS` without an offset, read as UTC
///
/// Other spellings such as `March 7, 2024` stay strings. A string of exactly
/// 24 hex characters becomes an [`ObjectId`].
pub fn coerce_value(value: Value) -> Operand {
    if let Value::String(s) = &value {
        if let Some(date) = parse_date(s) {
            return Operand::Date(date);
        }
        if let Ok(id) = s.parse::<ObjectId>() {
            return Operand::ObjectId(id);
        }
    }
    Operand::Json(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn iso_strings_become_dates() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(coerce_value(json!("2024-03-01T12:30:00Z")), Operand::Date(expected));
        assert_eq!(coerce_value(json!("2024-03-01T14:30:00+02:00")), Operand::Date(expected));
        assert_eq!(coerce_value(json!("2024-03-01T12:30:00")), Operand::Date(expected));
        assert_eq!(
            coerce_value(json!("2024-03-01")),
            Operand::Date(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn hex_ids_become_object_ids() {
        let operand = coerce_value(json!("507f1f77bcf86cd799439011"));
        match operand {
            Operand::ObjectId(id) => assert_eq!(id.to_hex(), "507f1f77bcf86cd799439011"),
            other => panic!("expected object id, got {:?}", other),
        }
    }

    #[test]
    fn other_values_pass_through() {
        assert_eq!(coerce_value(json!("active")), Operand::Json(json!("active")));
        assert_eq!(coerce_value(json!(42)), Operand::Json(json!(42)));
        assert_eq!(coerce_value(json!("2024")), Operand::Json(json!("2024")));
        assert_eq!(coerce_value(json!("507f1f77bcf86cd79943901")), Operand::Json(json!("507f1f77bcf86cd79943901")));
        assert_eq!(coerce_value(json!("zz7f1f77bcf86cd799439011")), Operand::Json(json!("zz7f1f77bcf86cd799439011")));
        assert_eq!(
            coerce_value(json!(["2024-03-01", "507f1f77bcf86cd799439011"])),
            Operand::Json(json!(["2024-03-01", "507f1f77bcf86cd799439011"]))
        );
    }

    #[test]
    fn rfc2822_and_uppercase_hex_are_recognised() {
        assert!(matches!(coerce_value(json!("Fri, 01 Mar 2024 12:30:00 +0000")), Operand::Date(_)));
        assert!(matches!(coerce_value(json!("507F1F77BCF86CD799439011")), Operand::ObjectId(_)));
        assert_eq!(coerce_value(json!(20240301)), Operand::Json(json!(20240301)));
    }

    #[test]
    fn object_id_serializes_as_hex() {
        let id: ObjectId = "507f1f77bcf86cd799439011".parse().unwrap();
        assert_eq!(serde_json::to_value(id).unwrap(), json!("507f1f77bcf86cd799439011"));
        assert_eq!(serde_json::from_value::<ObjectId>(json!("507f1f77bcf86cd799439011")).unwrap(), id);
    }
}
