use crate::constants;
use crate::error::{EtlError, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub geocoder: GeocoderConfig,
    pub paths: PathsConfig,
    pub names: NamesConfig,
    pub privacy: PrivacyConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub delimiter: char,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub country: String,
    pub language: String,
    pub timeout_seconds: u64,
    pub requests_per_minute: u64,
    pub retry_backoff_secs: u64,
    pub max_retries_per_candidate: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub variants: PathBuf,
    pub geocode_cache: PathBuf,
    pub output_csv: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NamesConfig {
    pub fuzzy_fallback: bool,
    pub similarity_cutoff: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub cutoff: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub table: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { delimiter: '\t' }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: constants::NOMINATIM_BASE_URL.to_string(),
            user_agent: constants::GEOCODER_USER_AGENT.to_string(),
            country: constants::GEOCODER_COUNTRY.to_string(),
            language: constants::GEOCODER_LANGUAGE.to_string(),
            timeout_seconds: constants::GEOCODER_TIMEOUT_SECS,
            requests_per_minute: constants::GEOCODER_REQUESTS_PER_MIN,
            retry_backoff_secs: constants::GEOCODER_RETRY_BACKOFF_SECS,
            max_retries_per_candidate: constants::GEOCODER_MAX_RETRIES_PER_CANDIDATE,
        }
    }
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            variants: PathBuf::from(constants::VARIANTS_FILE),
            geocode_cache: PathBuf::from(constants::GEOCODE_CACHE_FILE),
            output_csv: PathBuf::from(constants::OUTPUT_CSV_FILE),
        }
    }
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            fuzzy_fallback: false,
            similarity_cutoff: constants::SURNAME_SIMILARITY_CUTOFF,
        }
    }
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            cutoff: default_privacy_cutoff(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            table: constants::DATASET_TABLE.to_string(),
        }
    }
}

pub fn default_privacy_cutoff() -> NaiveDate {
    let (y, m, d) = constants::PRIVACY_CUTOFF;
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

impl Config {
    /// Load `ancestry.toml` from the working directory, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(constants::CONFIG_FILE)
    }

    /// Load a config file; a missing file yields the defaults.
    pub fn load_from<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            info!("No config file at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.names.similarity_cutoff) {
            return Err(EtlError::Config(format!(
                "names.similarity_cutoff must be within 0.0..=1.0, got {}",
                self.names.similarity_cutoff
            )));
        }
        if !self.input.delimiter.is_ascii() {
            return Err(EtlError::Config(format!(
                "input.delimiter must be an ASCII character, got {:?}",
                self.input.delimiter
            )));
        }
        if self.database.table.is_empty()
            || !self
                .database
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(EtlError::Config(format!(
                "database.table must be a plain identifier, got '{}'",
                self.database.table
            )));
        }
        Ok(())
    }
}
