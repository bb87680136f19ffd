//! Builds the bounding-box request sent to the GeoNames `weatherJSON` endpoint.

use reqwest::{Method, Url};

use crate::{error::PipelineError, model::Coordinate};

/// Degrees added/subtracted on every side of the coordinate.
pub const BOUNDING_BOX_OFFSET: f64 = 10.0;

const WEATHER_RESOURCE: &str = "weatherJSON";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Fixed-radius box around `coordinate`. Spans roughly a continent; not a proximity search.
    pub fn around(coordinate: Coordinate) -> Self {
        Self {
            north: coordinate.latitude + BOUNDING_BOX_OFFSET,
            south: coordinate.latitude - BOUNDING_BOX_OFFSET,
            east: coordinate.longitude + BOUNDING_BOX_OFFSET,
            west: coordinate.longitude - BOUNDING_BOX_OFFSET,
        }
    }
}

/// A fully-formed request for the weather provider.
#[derive(Debug, Clone)]
pub struct WeatherQuery {
    pub method: Method,
    pub url: Url,
    pub bounds: BoundingBox,
}

/// Build the provider request for `coordinate`, authenticating as `identity`.
///
/// Coordinates are never rejected, however far out of range.
pub fn build_query(
    coordinate: Coordinate,
    identity: &str,
    base_url: &str,
) -> Result<WeatherQuery, PipelineError> {
    validate_identity(identity)?;

    let mut url = Url::parse(base_url).map_err(|e| {
        PipelineError::InvalidRequest(format!("provider base URL '{base_url}' is invalid: {e}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(PipelineError::InvalidRequest(format!(
            "provider base URL '{base_url}' must use http or https"
        )));
    }

    url.path_segments_mut()
        .map_err(|_| {
            PipelineError::InvalidRequest(format!(
                "provider base URL '{base_url}' cannot be a base"
            ))
        })?
        .pop_if_empty()
        .push(WEATHER_RESOURCE);

    let bounds = BoundingBox::around(coordinate);

    url.query_pairs_mut()
        .append_pair("formatted", "true")
        .append_pair("north", &bounds.north.to_string())
        .append_pair("south", &bounds.south.to_string())
        .append_pair("east", &bounds.east.to_string())
        .append_pair("west", &bounds.west.to_string())
        .append_pair("username", identity);

    Ok(WeatherQuery { method: Method::GET, url, bounds })
}

fn validate_identity(identity: &str) -> Result<(), PipelineError> {
    if identity.trim().is_empty() {
        return Err(PipelineError::InvalidRequest(
            "provider username is empty.\nHint: run `ecomapper configure` first.".to_string(),
        ));
    }

    if let Some(bad) = identity
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(PipelineError::InvalidRequest(format!(
            "provider username contains invalid character {bad:?}"
        )));
    }

    Ok(())
}
