//! Turns a raw GeoNames `weatherJSON` body into at most one [`WeatherObservation`].
//!
//! The provider is loose with types: temperature normally arrives as a decimal string,
//! humidity as a number, and either may be missing. Field-level problems degrade to
//! "absent"; only an undecodable envelope is an error.
//!
//! Numeric literals that do not fit in an `f64` (`1e400`) are rejected by the JSON
//! parser itself, so such a body is reported as malformed as a whole.

use serde::{Deserialize, de::IgnoredAny};
use serde_json::Value;

use crate::{error::PipelineError, model::WeatherObservation};

const ENVELOPE_KEY: &str = "weatherObservations";
const STATUS_KEY: &str = "status";

/// Error body GeoNames sends instead of data (bad username, exhausted credits, ...).
#[derive(Debug, Default, Deserialize)]
struct ProviderStatus {
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    value: Option<Value>,
}

impl ProviderStatus {
    /// Anything that doesn't look like a status object yields an empty status.
    fn from_value(status: Value) -> Self {
        serde_json::from_value(status).unwrap_or_default()
    }

    fn describe(&self) -> String {
        format!(
            "provider reported error {}: {}",
            display_field(self.value.as_ref(), "?"),
            display_field(self.message.as_ref(), "no message"),
        )
    }
}

fn display_field(field: Option<&Value>, fallback: &str) -> String {
    match field {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    #[serde(default)]
    temperature: Option<LenientNumber>,
    #[serde(default)]
    humidity: Option<LenientNumber>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

impl LenientNumber {
    fn as_f64(&self) -> Option<f64> {
        match self {
            LenientNumber::Number(v) => Some(*v),
            LenientNumber::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            LenientNumber::Other(_) => None,
        }
    }
}

/// Decode the provider body. `Ok(None)` means the provider had no stations in range.
pub fn normalize(body: &[u8]) -> Result<Option<WeatherObservation>, PipelineError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| PipelineError::MalformedResponse(format!("body is not valid JSON: {e}")))?;

    let Value::Object(mut envelope) = value else {
        return Err(PipelineError::MalformedResponse(
            "expected a JSON object at the top level".to_string(),
        ));
    };

    // Sibling fields are only looked at when the observations are missing.
    let observations = match envelope.remove(ENVELOPE_KEY) {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(PipelineError::MalformedResponse(format!(
                "'{ENVELOPE_KEY}' is not an array"
            )));
        }
        None => {
            let reason = match envelope.remove(STATUS_KEY) {
                Some(status) => ProviderStatus::from_value(status).describe(),
                None => format!("missing '{ENVELOPE_KEY}'"),
            };
            return Err(PipelineError::MalformedResponse(reason));
        }
    };

    // Only the first station is used; the rest are never decoded.
    let Some(first) = observations.into_iter().next() else {
        return Ok(None);
    };

    if !first.is_object() {
        return Err(PipelineError::MalformedResponse(
            "first observation is not an object".to_string(),
        ));
    }

    let raw: RawObservation = serde_json::from_value(first)
        .map_err(|e| PipelineError::MalformedResponse(format!("unexpected observation: {e}")))?;

    Ok(Some(WeatherObservation {
        temperature: raw.temperature.as_ref().and_then(LenientNumber::as_f64),
        humidity: raw.humidity.as_ref().and_then(LenientNumber::as_f64),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(body: Value) -> Result<Option<WeatherObservation>, PipelineError> {
        normalize(body.to_string().as_bytes())
    }

    #[test]
    fn empty_list_is_no_observation() {
        let result = run(json!({ "weatherObservations": [] })).expect("not an error");
        assert_eq!(result, None);
    }

    #[test]
    fn string_temperature_and_numeric_humidity_are_parsed() {
        let obs = run(json!({
            "weatherObservations": [
                { "temperature": "21.5", "humidity": 60, "stationName": "KLAX" }
            ]
        }))
        .unwrap()
        .expect("observation present");

        assert_eq!(obs, WeatherObservation { temperature: Some(21.5), humidity: Some(60.0) });
    }

    #[test]
    fn unparsable_temperature_degrades_to_absent() {
        let obs = run(json!({
            "weatherObservations": [{ "temperature": "not-a-number", "humidity": 48 }]
        }))
        .unwrap()
        .unwrap();

        assert_eq!(obs.temperature, None);
        assert_eq!(obs.humidity, Some(48.0));
    }

    #[test]
    fn missing_and_null_fields_are_absent() {
        let obs = run(json!({ "weatherObservations": [{ "humidity": null }] }))
            .unwrap()
            .unwrap();

        assert!(obs.is_empty());
    }

    #[test]
    fn numeric_temperature_and_string_humidity_are_tolerated() {
        let obs = run(json!({
            "weatherObservations": [{ "temperature": 19.3, "humidity": " 48 " }]
        }))
        .unwrap()
        .unwrap();

        assert_eq!(obs, WeatherObservation { temperature: Some(19.3), humidity: Some(48.0) });
    }

    #[test]
    fn odd_field_types_degrade_to_absent() {
        let obs = run(json!({
            "weatherObservations": [{ "temperature": ["21"], "humidity": { "v": 3 } }]
        }))
        .unwrap()
        .unwrap();

        assert!(obs.is_empty());
    }

    #[test]
    fn non_finite_strings_are_absent() {
        let obs = run(json!({ "weatherObservations": [{ "temperature": "NaN" }] }))
            .unwrap()
            .unwrap();

        assert_eq!(obs.temperature, None);
    }

    #[test]
    fn only_first_observation_is_consulted() {
        let obs = run(json!({
            "weatherObservations": [
                { "temperature": "10", "humidity": 20 },
                "garbage",
                { "temperature": "99", "humidity": 99 }
            ]
        }))
        .unwrap()
        .unwrap();

        assert_eq!(obs, WeatherObservation { temperature: Some(10.0), humidity: Some(20.0) });
    }

    #[test]
    fn undecodable_bodies_are_malformed() {
        let bodies: [&[u8]; 6] = [
            b"",
            b"<html>502</html>",
            b"[1, 2, 3]",
            b"{}",
            br#"{"weatherObservations": {"temperature": "1"}}"#,
            br#"{"weatherObservations": [42]}"#,
        ];

        for body in bodies {
            let err = normalize(body).unwrap_err();
            assert!(
                matches!(err, PipelineError::MalformedResponse(_)),
                "{}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn provider_status_is_reported_in_message() {
        let err = run(json!({
            "status": { "message": "user does not exist.", "value": 10 }
        }))
        .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("provider reported error 10"));
        assert!(msg.contains("user does not exist."));
    }

    #[test]
    fn unrelated_status_field_does_not_hide_observations() {
        for status in [json!("ok"), json!({ "value": "x" }), json!(null)] {
            let obs = run(json!({
                "weatherObservations": [{ "temperature": "21.5", "humidity": 60 }],
                "status": status
            }))
            .expect("observations are still usable")
            .expect("observation present");

            assert_eq!(obs, WeatherObservation { temperature: Some(21.5), humidity: Some(60.0) });
        }
    }

    #[test]
    fn oddly_typed_status_without_observations_is_still_malformed() {
        let err = run(json!({ "status": { "value": "18", "message": 7 } })).unwrap_err();
        assert_eq!(err.to_string(), "Malformed weather response: provider reported error 18: 7");

        let err = run(json!({ "status": "down" })).unwrap_err();
        assert!(err.to_string().contains("provider reported error ?: no message"));
    }

    #[test]
    fn out_of_range_number_literal_rejects_whole_body() {
        let body = br#"{"weatherObservations": [{"temperature": "12", "humidity": 1e400}]}"#;

        let err = normalize(body).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MalformedResponse(msg) if msg.contains("not valid JSON")
        ));
    }
}
