use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A point on the globe, in degrees. Not range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Used when a submission carries no explicit location (downtown Los Angeles).
    pub const DEFAULT: Coordinate = Coordinate { latitude: 34.052235, longitude: -118.243683 };

    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A manual reading entered by the user at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserSample {
    pub temperature: f64,
    pub humidity: f64,
    pub coordinate: Coordinate,
}

impl UserSample {
    pub fn new(temperature: f64, humidity: f64, coordinate: Coordinate) -> Self {
        Self { temperature, humidity, coordinate }
    }
}

/// What the weather provider reported for a location. Either field may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl WeatherObservation {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none()
    }
}

/// The persisted pairing of a user sample with the provider's observation.
///
/// Missing API values are stored as `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalRecord {
    pub id: String,
    pub api_temperature: f64,
    pub api_humidity: f64,
    pub user_temperature: f64,
    pub user_humidity: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl EnvironmentalRecord {
    /// Build a fresh record with a newly generated id.
    pub fn from_sample(sample: &UserSample, observation: Option<&WeatherObservation>) -> Self {
        let api_temperature = observation.and_then(|o| o.temperature).unwrap_or(0.0);
        let api_humidity = observation.and_then(|o| o.humidity).unwrap_or(0.0);

        Self {
            id: Uuid::new_v4().to_string(),
            api_temperature,
            api_humidity,
            user_temperature: sample.temperature,
            user_humidity: sample.humidity,
            latitude: sample.coordinate.latitude,
            longitude: sample.coordinate.longitude,
        }
    }
}
