use async_trait::async_trait;

use crate::error::Result;
use crate::types::{GeoLocation, Record};

/// External gazetteer used to resolve place names.
///
/// Implementations return `Ok(None)` when the provider has no match,
/// `EtlError::GeocoderTimeout` for transient timeouts and
/// `EtlError::GeocoderUnavailable` for any other provider failure.
#[async_trait]
pub trait GeocoderPort: Send + Sync {
    async fn geocode(&self, query: &str, language: &str) -> Result<Option<GeoLocation>>;
}

/// Destination for the final record sequence.
pub trait RecordSink {
    /// Short name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    fn write(&mut self, records: &[Record]) -> Result<()>;
}
