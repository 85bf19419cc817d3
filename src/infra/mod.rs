// Adapters for the ports in `app::ports`
pub mod csv_sink;
pub mod nominatim;
pub mod rate_limiter;
pub mod sqlite_sink;

pub use csv_sink::CsvSink;
pub use nominatim::NominatimGeocoder;
pub use rate_limiter::RateLimiter;
pub use sqlite_sink::SqliteSink;
