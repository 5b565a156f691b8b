//! Run Params - validated parameter set of a single run

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON key holding the configured run length.
pub const MAX_DAYS_KEY: &str = "maxDays";

/// Parameters a simulation run was started with.
///
/// `maxDays` is the only key the pipeline interprets, so it is validated
/// once at load time. Every other key is kept verbatim in an ordered
/// extension map; equality is structural and independent of the key order
/// of the source file. Integral floats are stored as integers, so `1` and
/// `1.0` are the same value (and `1.0` serializes back as `1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct RunParams {
    #[serde(rename = "maxDays")]
    max_days: i64,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl RunParams {
    /// Create a parameter set with the given run length and no extra keys.
    #[must_use]
    pub fn new(max_days: i64) -> Self {
        Self {
            max_days,
            extra: BTreeMap::new(),
        }
    }

    /// Add an extension parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), normalize(value.into()));
        self
    }

    /// Validate a parsed JSON document.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason if the document is not an object, or
    /// if `maxDays` is missing, non-integral, or below 1.
    pub fn from_value(value: Value) -> std::result::Result<Self, String> {
        let Value::Object(map) = value else {
            return Err(format!("params must be a JSON object, got {}", kind_of(&value)));
        };

        let mut extra: BTreeMap<String, Value> =
            map.into_iter().map(|(k, v)| (k, normalize(v))).collect();
        let raw = extra
            .remove(MAX_DAYS_KEY)
            .ok_or_else(|| format!("params lack required key '{MAX_DAYS_KEY}'"))?;

        let max_days = integral(&raw)
            .ok_or_else(|| format!("'{MAX_DAYS_KEY}' must be an integer, got {raw}"))?;
        if max_days < 1 {
            return Err(format!("'{MAX_DAYS_KEY}' must be >= 1, got {max_days}"));
        }

        Ok(Self { max_days, extra })
    }

    /// Configured number of days (ticks) a complete run lasts.
    #[must_use]
    pub const fn max_days(&self) -> i64 {
        self.max_days
    }

    /// Look up an extension parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// All extension parameters, ordered by key.
    #[must_use]
    pub const fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }
}

impl TryFrom<Value> for RunParams {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn integral(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    integral_f64(value.as_f64()?)
}

fn integral_f64(f: f64) -> Option<i64> {
    #[allow(clippy::cast_possible_truncation)]
    let truncated = f as i64;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then_some(truncated)
}

/// Collapse integral floats to integers, recursively.
fn normalize(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .and_then(integral_f64)
            .map_or(Value::Number(n), Value::from),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect())
        }
        other => other,
    }
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_from_value() {
        let params =
            RunParams::from_value(json!({"maxDays": 50, "foodRate": 0.5, "uniform": true}))
                .unwrap();
        assert_eq!(params.max_days(), 50);
        assert_eq!(params.get("foodRate"), Some(&json!(0.5)));
        assert_eq!(params.extra().len(), 2);
    }

    #[test]
    fn test_params_key_order_independent() {
        let a = RunParams::from_value(json!({"maxDays": 10, "a": 1, "b": "x"})).unwrap();
        let b: RunParams =
            serde_json::from_str(r#"{"b": "x", "a": 1, "maxDays": 10}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_integral_floats_equal_integers() {
        let a = json!({"maxDays": 5, "pgFactor": 1, "w": [2.0, {"k": 3.0}]});
        let b = json!({"maxDays": 5, "pgFactor": 1.0, "w": [2, {"k": 3}]});
        let (a, b) = (RunParams::from_value(a).unwrap(), RunParams::from_value(b).unwrap());
        assert_eq!(a, b);
        assert_eq!(b.get("pgFactor"), Some(&json!(1)));
        assert_eq!(
            RunParams::new(5).with("pgFactor", 1.0),
            RunParams::new(5).with("pgFactor", 1)
        );

        let c = RunParams::from_value(json!({"maxDays": 5, "pgFactor": 1.5})).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_params_integral_float_accepted() {
        let params = RunParams::from_value(json!({"maxDays": 50.0})).unwrap();
        assert_eq!(params.max_days(), 50);
    }

    #[test]
    fn test_params_rejects_bad_max_days() {
        assert!(RunParams::from_value(json!({"other": 1}))
            .unwrap_err()
            .contains("maxDays"));
        assert!(RunParams::from_value(json!({"maxDays": "50"})).is_err());
        assert!(RunParams::from_value(json!({"maxDays": 2.5})).is_err());
        assert!(RunParams::from_value(json!({"maxDays": 0})).is_err());
        assert!(RunParams::from_value(json!([1, 2])).unwrap_err().contains("array"));
    }

    #[test]
    fn test_params_serialize_flat() {
        let params = RunParams::new(7).with("seed", 42);
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value, json!({"maxDays": 7, "seed": 42}));
    }
}
