//! Pairs a user sample with the provider's observation and stores the result.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::{
    error::PipelineError,
    model::{Coordinate, EnvironmentalRecord, UserSample, WeatherObservation},
    normalize::normalize,
    query::build_query,
    store::RecordStore,
    transport::WeatherTransport,
};

pub const DEFAULT_GEONAMES_URL: &str = "http://api.geonames.org";

/// Where and as whom to query the weather provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub username: String,
    pub base_url: String,
}

impl ProviderSettings {
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into(), base_url: DEFAULT_GEONAMES_URL.to_string() }
    }
}

/// Outcome of the weather lookup for one submission.
///
/// Stored records flatten this to `0.0` defaults; this keeps the distinction.
#[derive(Debug)]
pub enum Enrichment {
    Observed(WeatherObservation),
    /// The provider answered but had no station inside the bounding box.
    NoStations,
    /// Transport or decoding failed; the error is kept for diagnostics only.
    Unavailable(PipelineError),
}

impl Enrichment {
    pub fn observation(&self) -> Option<WeatherObservation> {
        match self {
            Enrichment::Observed(obs) => Some(*obs),
            Enrichment::NoStations | Enrichment::Unavailable(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct RecordAssembler {
    settings: ProviderSettings,
    transport: Arc<dyn WeatherTransport>,
    store: Arc<dyn RecordStore>,
}

impl RecordAssembler {
    pub fn new(
        settings: ProviderSettings,
        transport: Arc<dyn WeatherTransport>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self { settings, transport, store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Look up the weather near `coordinate`.
    ///
    /// Only a request that cannot be built is an error. Transport and decoding
    /// failures come back as [`Enrichment::Unavailable`]. Never retried.
    pub async fn enrich(&self, coordinate: Coordinate) -> Result<Enrichment, PipelineError> {
        let query = build_query(coordinate, &self.settings.username, &self.settings.base_url)?;

        let body = match self.transport.fetch(&query).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "weather lookup failed, continuing without API data");
                return Ok(Enrichment::Unavailable(err));
            }
        };

        Ok(match normalize(&body) {
            Ok(Some(obs)) => Enrichment::Observed(obs),
            Ok(None) => {
                tracing::info!(
                    latitude = coordinate.latitude,
                    longitude = coordinate.longitude,
                    "no weather stations reported near location"
                );
                Enrichment::NoStations
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "weather response unusable, continuing without API data"
                );
                Enrichment::Unavailable(err)
            }
        })
    }

    pub async fn fetch_observation(
        &self,
        coordinate: Coordinate,
    ) -> Result<Option<WeatherObservation>, PipelineError> {
        Ok(self.enrich(coordinate).await?.observation())
    }

    /// Build and store one record for `sample`.
    ///
    /// On a save failure the returned error still carries the record that was attempted.
    pub async fn assemble(&self, sample: UserSample) -> Result<EnvironmentalRecord, PipelineError> {
        let enrichment = self.enrich(sample.coordinate).await?;
        let observation = enrichment.observation();
        let record = EnvironmentalRecord::from_sample(&sample, observation.as_ref());

        if let Err(source) = self.store.insert(&record).await {
            tracing::error!(id = %record.id, error = %source, "failed to save record");
            return Err(PipelineError::PersistenceFailure { record: Box::new(record), source });
        }

        tracing::info!(
            id = %record.id,
            api_observed = observation.is_some(),
            api_temperature = record.api_temperature,
            api_humidity = record.api_humidity,
            "saved environmental record"
        );
        Ok(record)
    }

    /// Run [`Self::assemble`] as an independent task.
    ///
    /// Dropping the handle does not cancel the submission.
    pub fn submit(
        self: &Arc<Self>,
        sample: UserSample,
    ) -> JoinHandle<Result<EnvironmentalRecord, PipelineError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.assemble(sample).await })
    }
}
