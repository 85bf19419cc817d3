// Record transformation stages, in pipeline order
pub mod dates;
pub mod geocode;
pub mod names;
pub mod redact;

use crate::error::Result;
use crate::types::Record;

pub use geocode::{candidates, GeocodeCache, GeocodeResolver, ResolverSettings, ResolverStats};
pub use names::{latest_dates_by_surname, NameNormalizer, VariantTable};
pub use redact::{RedactionStats, Redactor};

/// Parse the raw date columns and strip transcription marks from the surname.
pub fn clean_record(mut record: Record) -> Result<Record> {
    for field in record.date_fields_mut() {
        *field = dates::normalize_field(field.take())?;
    }
    record.last_name = record.last_name.as_deref().map(names::strip_editorial_marks);
    Ok(record)
}
