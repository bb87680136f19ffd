//! Core library for the `ecomapper` CLI.
//!
//! This crate defines:
//! - The weather fetch-and-normalize pipeline (query, transport, normalizer, assembler)
//! - Record persistence behind the [`RecordStore`] trait
//! - Free-text location search
//! - Configuration & credentials handling
//!
//! It is used by `ecomapper-cli`, but can also be embedded in other front ends.

pub mod assembler;
pub mod config;
pub mod error;
pub mod geocode;
pub mod model;
pub mod normalize;
pub mod query;
pub mod store;
pub mod transport;

pub use assembler::{Enrichment, ProviderSettings, RecordAssembler};
pub use config::Config;
pub use error::PipelineError;
pub use geocode::{GeocodeError, LocationSearch, NominatimSearch};
pub use model::{Coordinate, EnvironmentalRecord, UserSample, WeatherObservation};
pub use normalize::normalize;
pub use query::{BoundingBox, WeatherQuery, build_query};
pub use store::{MemoryStore, RecordStore, SqliteStore, StoreError};
pub use transport::{HttpTransport, WeatherTransport};
