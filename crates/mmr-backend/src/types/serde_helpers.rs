/*
[INPUT]:  Loosely typed JSON numbers (numbers, numeric strings, nulls)
[OUTPUT]: Millisecond values coerced to i64
[POS]:    Data layer - shared serde helpers for remote rows and local snapshots
[UPDATE]: When a new loosely typed numeric field appears
*/

//! Some serializations round-trip integers as strings (bigint columns, older
//! local snapshots). These helpers accept either form.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::enums::Stage;

fn millis_from_value(value: &Value) -> Result<Option<i64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return Ok(Some(int));
            }
            number
                .as_f64()
                .filter(|float| float.is_finite())
                .map(|float| Some(float.round() as i64))
                .ok_or_else(|| format!("invalid millisecond value: {number}"))
        }
        Value::String(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(None);
            }
            if let Ok(int) = raw.parse::<i64>() {
                return Ok(Some(int));
            }
            raw.parse::<f64>()
                .ok()
                .filter(|float| float.is_finite())
                .map(|float| Some(float.round() as i64))
                .ok_or_else(|| format!("invalid millisecond value: {raw:?}"))
        }
        other => Err(format!("invalid millisecond value: {other}")),
    }
}

/// Deserialize milliseconds, treating null or an empty string as zero.
pub fn deserialize_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    millis_from_value(&value)
        .map(|millis| millis.unwrap_or(0))
        .map_err(serde::de::Error::custom)
}

/// Deserialize optional milliseconds; null or an empty string become `None`.
pub fn deserialize_opt_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    millis_from_value(&value).map_err(serde::de::Error::custom)
}

/// Deserialize a `stage -> millis` map whose values may be numeric strings.
pub fn deserialize_stage_millis<'de, D>(deserializer: D) -> Result<BTreeMap<Stage, i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<Stage, Value>> = Option::deserialize(deserializer)?;
    let mut stages = BTreeMap::new();
    for (stage, value) in raw.unwrap_or_default() {
        let millis = millis_from_value(&value).map_err(serde::de::Error::custom)?;
        stages.insert(stage, millis.unwrap_or(0));
    }
    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "deserialize_millis")]
        millis: i64,
        #[serde(default, deserialize_with = "deserialize_opt_millis")]
        maybe: Option<i64>,
    }

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        let row: Row = serde_json::from_value(json!({"millis": "2500", "maybe": 17})).unwrap();
        assert_eq!(row.millis, 2500);
        assert_eq!(row.maybe, Some(17));

        let row: Row = serde_json::from_value(json!({"millis": 12.6, "maybe": "40"})).unwrap();
        assert_eq!(row.millis, 13);
        assert_eq!(row.maybe, Some(40));
    }

    #[test]
    fn null_and_empty_become_defaults() {
        let row: Row = serde_json::from_value(json!({"millis": null, "maybe": ""})).unwrap();
        assert_eq!(row.millis, 0);
        assert_eq!(row.maybe, None);
    }

    #[test]
    fn rejects_non_numeric_strings() {
        let result: Result<Row, _> = serde_json::from_value(json!({"millis": "soon"}));
        assert!(result.is_err());
        let result: Result<Row, _> = serde_json::from_value(json!({"millis": true}));
        assert!(result.is_err());
    }
}
