// Reading the ancestry export into records
pub mod reader;
pub mod schema;

pub use reader::{decode_utf16, parse_records, read_records};
pub use schema::{output_header, FieldMapper, EXPORT_COLUMNS};
