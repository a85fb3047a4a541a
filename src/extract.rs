// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request extractors and lenient field deserializers.

use crate::error::AppError;
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

/// JSON body extractor whose rejections use the API error format.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
        }
    }
}

/// Deserializers that accept numbers sent either as JSON numbers or strings.
pub mod flex {
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;
    use serde_json::Value;

    fn number(value: &Value) -> Result<Option<f64>, String> {
        match value {
            Value::Null => Ok(None),
            Value::Number(n) => Ok(n.as_f64()),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Some)
                .ok_or_else(|| "A valid number is required.".to_string()),
            _ => Err("A valid number is required.".to_string()),
        }
    }

    fn integer(value: &Value) -> Result<Option<i64>, String> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| "A valid integer is required.".to_string()),
            Value::String(s) if !s.trim().is_empty() => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| "A valid integer is required.".to_string()),
            other => number(other).and_then(|n| match n {
                None => Ok(None),
                Some(_) => Err("A valid integer is required.".to_string()),
            }),
        }
    }

    /// Optional float: number, numeric string, null or blank.
    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        number(&Value::deserialize(d)?).map_err(D::Error::custom)
    }

    /// Optional integer: number, numeric string, null or blank.
    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        integer(&Value::deserialize(d)?).map_err(D::Error::custom)
    }

    /// Non-negative quantity, null counting as zero.
    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        match integer(&Value::deserialize(d)?).map_err(D::Error::custom)? {
            None => Ok(0),
            Some(n) if n >= 0 => Ok(n),
            Some(_) => Err(D::Error::custom("Ensure this value is greater than or equal to 0.")),
        }
    }

    /// Optional text that also accepts numbers (phone numbers, ids).
    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            _ => Err(D::Error::custom("Not a valid string.")),
        }
    }

    /// Optional boolean: true/false, "true"/"false" or 1/0.
    pub fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                _ => Err(D::Error::custom("Must be a valid boolean.")),
            },
            Value::Number(n) => match n.as_i64() {
                Some(1) => Ok(Some(true)),
                Some(0) => Ok(Some(false)),
                _ => Err(D::Error::custom("Must be a valid boolean.")),
            },
            _ => Err(D::Error::custom("Must be a valid boolean.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::flex;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "flex::opt_f64")]
        lat: Option<f64>,
        #[serde(default, deserialize_with = "flex::opt_i64")]
        id: Option<i64>,
        #[serde(default, deserialize_with = "flex::count")]
        water: i64,
    }

    #[test]
    fn test_numbers_or_strings() {
        let p: Sample =
            serde_json::from_value(json!({"lat": "14.5995", "id": 7, "water": "3"})).unwrap();
        assert_eq!(p.lat, Some(14.5995));
        assert_eq!(p.id, Some(7));
        assert_eq!(p.water, 3);

        let p: Sample = serde_json::from_value(json!({"lat": null, "id": "12"})).unwrap();
        assert_eq!(p.lat, None);
        assert_eq!(p.id, Some(12));
        assert_eq!(p.water, 0);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_value::<Sample>(json!({"lat": "north"})).is_err());
        assert!(serde_json::from_value::<Sample>(json!({"id": 1.5})).is_err());
        assert!(serde_json::from_value::<Sample>(json!({"water": -2})).is_err());
    }
}
