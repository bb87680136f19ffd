use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::{
    assembler::{DEFAULT_GEONAMES_URL, ProviderSettings},
    geocode::DEFAULT_NOMINATIM_URL,
};

/// GeoNames account settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// GeoNames username, sent with every weather request.
    pub username: Option<String>,
    #[serde(default = "default_geonames_url")]
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self { username: None, base_url: default_geonames_url() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_nominatim_url")]
    pub base_url: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self { base_url: default_nominatim_url() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding the records; platform data dir when unset.
    pub database: Option<PathBuf>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [provider]
/// username = "..."
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_geonames_url() -> String {
    DEFAULT_GEONAMES_URL.to_string()
}

fn default_nominatim_url() -> String {
    DEFAULT_NOMINATIM_URL.to_string()
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "ecomapper", "ecomapper")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Where records are stored: the configured path or `records.db` in the data dir.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("records.db")),
        }
    }

    pub fn set_provider_username(&mut self, username: String) {
        self.provider.username = Some(username);
    }

    /// The configured GeoNames username.
    pub fn provider_username(&self) -> Result<&str> {
        self.provider
            .username
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No GeoNames username configured.\n\
                     Hint: run `ecomapper configure` and enter your username."
                )
            })
    }

    pub fn provider_settings(&self) -> Result<ProviderSettings> {
        Ok(ProviderSettings {
            username: self.provider_username()?.to_owned(),
            base_url: self.provider.base_url.clone(),
        })
    }
}
