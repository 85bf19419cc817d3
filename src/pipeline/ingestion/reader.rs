use crate::error::{EtlError, Result};
use crate::pipeline::ingestion::schema::FieldMapper;
use crate::types::Record;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Decode a UTF-16 export. A byte order mark selects the endianness;
/// without one the text is taken as little endian.
pub fn decode_utf16(bytes: &[u8]) -> Result<String> {
    let (big_endian, body) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (false, rest),
        [0xFE, 0xFF, rest @ ..] => (true, rest),
        _ => (false, bytes),
    };

    if body.len() % 2 != 0 {
        return Err(EtlError::MalformedInput {
            row: 0,
            message: format!("odd byte count {} for UTF-16 input", body.len()),
        });
    }

    let units = body.chunks_exact(2).map(|pair| {
        if big_endian {
            u16::from_be_bytes([pair[0], pair[1]])
        } else {
            u16::from_le_bytes([pair[0], pair[1]])
        }
    });

    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| EtlError::MalformedInput {
            row: 0,
            message: format!("invalid UTF-16: {}", e),
        })
}

/// Parse decoded export text into records, discarding the header row.
pub fn parse_records(text: &str, delimiter: u8, mapper: &FieldMapper) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        if index == 0 {
            debug!("Skipping export header with {} fields", row.len());
            continue;
        }
        records.push(mapper.map_row(index + 1, &row)?);
    }
    Ok(records)
}

/// Read a UTF-16 tab-separated export from disk.
#[instrument(skip(path, mapper), fields(file = %path.as_ref().display()))]
pub fn read_records<P: AsRef<Path>>(
    path: P,
    delimiter: u8,
    mapper: &FieldMapper,
) -> Result<Vec<Record>> {
    let bytes = fs::read(path.as_ref())?;
    let text = decode_utf16(&bytes)?;
    let records = parse_records(&text, delimiter, mapper)?;
    info!("Read {} records", records.len());
    Ok(records)
}
