//! Data models for the weather map application
//!
//! This module contains the core domain models organized by concern:
//! - Location: Geographic coordinates and metadata
//! - Observation: Station readings, raw and cleaned
//! - Forecast: Forecast periods, raw and cleaned
//! - Weather: Temperature categories, icons and heatmap metrics

pub mod forecast;
pub mod location;
pub mod observation;
pub mod weather;

// Re-export all public types for convenient access
pub use forecast::{ForecastPeriod, ForecastRecord};
pub use location::Location;
pub use observation::{Observation, ObservationRecord};
pub use weather::{Metric, TempCategory};

/// Serde helpers that coerce loosely typed provider values.
///
/// Numbers may arrive as JSON numbers, numeric strings or `null`; anything that
/// is not a finite number is treated as missing.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.and_then(|v| number(&v)))
    }

    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }))
    }

    pub(crate) fn number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|f| f.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::lenient;
    use serde_json::json;

    #[test]
    fn test_lenient_number_coercion() {
        assert_eq!(lenient::number(&json!(42)), Some(42.0));
        assert_eq!(lenient::number(&json!("41.5")), Some(41.5));
        assert_eq!(lenient::number(&json!(" 7 ")), Some(7.0));
        assert_eq!(lenient::number(&json!("N/A")), None);
        assert_eq!(lenient::number(&json!("NaN")), None);
        assert_eq!(lenient::number(&json!(null)), None);
        assert_eq!(lenient::number(&json!([1])), None);
    }
}
