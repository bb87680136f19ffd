use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use ecomapper_core::{
    Config, Coordinate, EnvironmentalRecord, HttpTransport, LocationSearch, MemoryStore,
    NominatimSearch, PipelineError, RecordAssembler, RecordStore, SqliteStore, UserSample,
    WeatherObservation,
};
use inquire::Text;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "ecomapper",
    version,
    about = "Record temperature and humidity next to live weather"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the GeoNames account used for weather lookups.
    Configure,

    /// Record a manual reading, paired with the provider's current observation.
    Submit {
        /// Measured temperature in °C (0-100).
        #[arg(long, value_parser = parse_reading)]
        temperature: f64,

        /// Measured relative humidity in % (0-100).
        #[arg(long, value_parser = parse_reading)]
        humidity: f64,

        #[arg(
            long,
            allow_negative_numbers = true,
            requires = "lon",
            conflicts_with = "place"
        )]
        lat: Option<f64>,

        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lon: Option<f64>,

        /// Free-text place to geocode instead of --lat/--lon.
        #[arg(long)]
        place: Option<String>,
    },

    /// Show the provider's observation near a coordinate without recording anything.
    Observe {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },

    /// List stored records, coldest user reading first.
    History {
        /// Print as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored record.
    Delete {
        /// Record id as shown by `history`.
        id: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Command::Configure => configure(&mut config),
            Command::Observe { lat, lon } => observe(&config, Coordinate::new(lat, lon)).await,
            Command::Submit { temperature, humidity, lat, lon, place } => {
                let coordinate = match (lat, lon, place) {
                    (Some(lat), Some(lon), _) => Coordinate::new(lat, lon),
                    (_, _, Some(place)) => resolve_place(&config, &place).await?,
                    _ => Coordinate::DEFAULT,
                };
                let sample = UserSample::new(temperature, humidity, coordinate);

                let store = open_store(&config).await?;
                let result = submit(&config, &store, sample).await;
                close_store(store, result).await
            }
            Command::History { json } => {
                let store = open_store(&config).await?;
                let result = history(&store, json).await;
                close_store(store, result).await
            }
            Command::Delete { id } => {
                let store = open_store(&config).await?;
                let result = delete(&store, &id).await;
                close_store(store, result).await
            }
        }
    }
}

async fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let path = config.database_path()?;
    SqliteStore::open(&path)
        .await
        .with_context(|| format!("Failed to open record database: {}", path.display()))
}

/// Close the store after a command, keeping the command's own error if it had one.
async fn close_store(store: SqliteStore, result: anyhow::Result<()>) -> anyhow::Result<()> {
    let closed = store.close().await.context("Failed to close record database");
    result.and(closed)
}

async fn submit(config: &Config, store: &SqliteStore, sample: UserSample) -> anyhow::Result<()> {
    let assembler = Arc::new(RecordAssembler::new(
        config.provider_settings()?,
        Arc::new(HttpTransport::new()),
        Arc::new(store.clone()),
    ));

    match assembler.submit(sample).await? {
        Ok(record) => {
            println!("Saved record {}", record.id);
            println!("{}", format_record(&record));
            Ok(())
        }
        Err(PipelineError::PersistenceFailure { record, source }) => {
            eprintln!("{}", format_record(&record));
            Err(anyhow!(source).context(format!("Record {} was not saved", record.id)))
        }
        Err(err) => Err(err.into()),
    }
}

async fn history(store: &SqliteStore, json: bool) -> anyhow::Result<()> {
    let records = store.list_by_user_temperature().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("No records yet.");
    } else {
        for record in &records {
            println!("[{}]\n{}\n", record.id, format_record(record));
        }
    }
    Ok(())
}

async fn delete(store: &SqliteStore, id: &str) -> anyhow::Result<()> {
    if store.delete(id).await? {
        println!("Deleted record {id}");
        Ok(())
    } else {
        Err(anyhow!("No record with id '{id}'"))
    }
}

fn configure(config: &mut Config) -> anyhow::Result<()> {
    let mut prompt = Text::new("GeoNames username:")
        .with_help_message("Register for free at https://www.geonames.org/login");
    if let Some(current) = config.provider.username.as_deref() {
        prompt = prompt.with_default(current);
    }

    let username = prompt.prompt()?.trim().to_string();
    if username.is_empty() {
        return Err(anyhow!("Username must not be empty"));
    }

    config.set_provider_username(username);
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn observe(config: &Config, coordinate: Coordinate) -> anyhow::Result<()> {
    // Nothing is written, so an in-memory store is enough.
    let assembler = RecordAssembler::new(
        config.provider_settings()?,
        Arc::new(HttpTransport::new()),
        Arc::new(MemoryStore::new()),
    );

    match assembler.fetch_observation(coordinate).await? {
        Some(obs) => println!("{}", format_observation(&obs)),
        None => println!(
            "No weather observation available near {:.5}, {:.5}",
            coordinate.latitude, coordinate.longitude
        ),
    }
    Ok(())
}

async fn resolve_place(config: &Config, place: &str) -> anyhow::Result<Coordinate> {
    let search = NominatimSearch::new(config.geocoder.base_url.clone())?;
    search
        .search(place)
        .await?
        .ok_or_else(|| anyhow!("Location not found: {place}"))
}

fn parse_reading(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|_| format!("'{raw}' is not a number"))?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside 0..=100"))
    }
}

fn format_record(record: &EnvironmentalRecord) -> String {
    format!(
        "API Temp: {:.2}°\n\
         API Humidity: {:.2}%\n\
         User Temp: {:.2}°\n\
         User Humidity: {:.2}%\n\
         Latitude: {:.5}\n\
         Longitude: {:.5}",
        record.api_temperature,
        record.api_humidity,
        record.user_temperature,
        record.user_humidity,
        record.latitude,
        record.longitude,
    )
}

fn format_observation(obs: &WeatherObservation) -> String {
    let show = |v: Option<f64>, unit: &str| match v {
        Some(v) => format!("{v:.2}{unit}"),
        None => "n/a".to_string(),
    };
    format!("Temperature: {}\nHumidity: {}", show(obs.temperature, "°"), show(obs.humidity, "%"))
}
