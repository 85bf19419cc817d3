use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Malformed input at row {row}: {message}")]
    MalformedInput { row: usize, message: String },

    #[error("Could not parse date '{value}': {reason}")]
    DateParse { value: String, reason: String },

    #[error("Geocoder timed out for '{query}'")]
    GeocoderTimeout { query: String },

    #[error("Geocoder unavailable: {0}")]
    GeocoderUnavailable(String),

    #[error("Invalid surname variant table: {0}")]
    InvalidVariantTable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtlError {
    pub fn date_parse(value: &str, reason: impl Into<String>) -> Self {
        EtlError::DateParse {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Transient provider failures the pipeline recovers from instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EtlError::GeocoderTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
