//! Defaults shared by the config layer and the pipeline stages.
//! Values here are only used when `ancestry.toml` does not override them.

// Privacy cutoff (1 January 1945), as (year, month, day)
pub const PRIVACY_CUTOFF: (i32, u32, u32) = (1945, 1, 1);

// Gazetteer defaults
pub const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const GEOCODER_USER_AGENT: &str = "ancestry-geocoder";
pub const GEOCODER_COUNTRY: &str = "Germany";
pub const GEOCODER_LANGUAGE: &str = "de";
pub const GEOCODER_TIMEOUT_SECS: u64 = 20;
pub const GEOCODER_REQUESTS_PER_MIN: u64 = 60;
pub const GEOCODER_RETRY_BACKOFF_SECS: u64 = 5;
pub const GEOCODER_MAX_RETRIES_PER_CANDIDATE: u32 = 1;

// File locations
pub const CONFIG_FILE: &str = "ancestry.toml";
pub const VARIANTS_FILE: &str = "data/name_variants.json";
pub const GEOCODE_CACHE_FILE: &str = "data/geocode_cache.json";
pub const OUTPUT_CSV_FILE: &str = "output.csv";

// Relational sink
pub const DATASET_TABLE: &str = "ancestry_dataset";
pub const DEV_DB_URL_VAR: &str = "DEV_DB_URL";
pub const PROD_DB_URL_VAR: &str = "PROD_DB_URL";

// Surname matching
pub const SURNAME_SIMILARITY_CUTOFF: f64 = 0.8;

// Separator used when a list of spellings is written into one cell
pub const VARIATIONS_SEPARATOR: &str = "|";

// Metrics
pub const METRICS_PORT_VAR: &str = "ANCESTRY_METRICS_PORT";
