use thiserror::Error;

use crate::{model::EnvironmentalRecord, store::StoreError};

/// Failures that can occur while turning a user sample into a stored record.
///
/// Only [`PipelineError::InvalidRequest`] and [`PipelineError::PersistenceFailure`]
/// ever reach the caller of [`crate::RecordAssembler::assemble`]. The other two are
/// absorbed as "no observation available".
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid weather request: {0}")]
    InvalidRequest(String),

    #[error("Weather transport failed: {0}")]
    TransportFailure(String),

    #[error("Malformed weather response: {0}")]
    MalformedResponse(String),

    #[error("Failed to save record {}: {source}", .record.id)]
    PersistenceFailure {
        /// The record as it was handed to the store.
        record: Box<EnvironmentalRecord>,
        #[source]
        source: StoreError,
    },
}

impl PipelineError {
    /// Whether the error is surfaced to the user rather than downgraded to missing data.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidRequest(_) | PipelineError::PersistenceFailure { .. }
        )
    }
}
