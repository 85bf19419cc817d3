use crate::app::ports::RecordSink;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::ingestion::schema::output_header;
use crate::types::Record;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Comma-separated output file with the fixed output header.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Write the header and every record to `writer`.
pub fn write_csv<W: io::Write>(writer: W, records: &[Record]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(output_header())?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

impl RecordSink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn write(&mut self, records: &[Record]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(&self.path)?;
        write_csv(io::BufWriter::new(file), records)?;
        metrics::records::written(self.name(), records.len());
        info!("Wrote {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DateField, Variations};
    use chrono::NaiveDate;

    fn sample() -> Record {
        Record {
            reference: Some("I7".to_string()),
            last_name: Some("Pöttinger".to_string()),
            date_birth: Some(DateField::Parsed(NaiveDate::from_ymd_opt(1800, 1, 1).unwrap())),
            last_name_normed: Some("Bettinger".to_string()),
            last_name_variations: Some(Variations(vec![
                "Pettinger".to_string(),
                "Pöttinger".to_string(),
            ])),
            latitude: Some(48.5),
            longitude: Some(13.25),
            place: Some("Griesbach im Rottal".to_string()),
            year_birth: Some(1800),
            ..Default::default()
        }
    }

    fn written(records: &[Record]) -> Vec<csv::StringRecord> {
        let mut buf = Vec::new();
        write_csv(&mut buf, records).unwrap();
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(buf.as_slice())
            .records()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_header_matches_record_layout() {
        let rows = written(&[sample()]);
        let header: Vec<&str> = rows[0].iter().collect();
        assert_eq!(header, output_header());
        assert_eq!(rows[1].len(), header.len());
    }

    #[test]
    fn test_values_land_in_their_columns() {
        let rows = written(&[sample()]);
        let header = output_header();
        let cell = |name: &str| {
            let index = header.iter().position(|h| *h == name).unwrap();
            rows[1].get(index).unwrap().to_string()
        };

        assert_eq!(cell("reference"), "I7");
        assert_eq!(cell("date_birth"), "1800-01-01");
        assert_eq!(cell("date_death"), "");
        assert_eq!(cell("last_name_normed"), "Bettinger");
        assert_eq!(cell("last_name_variations"), "Pettinger|Pöttinger");
        assert_eq!(cell("latitude"), "48.5");
        assert_eq!(cell("place"), "Griesbach im Rottal");
        assert_eq!(cell("year_birth"), "1800");
        assert_eq!(cell("year_death"), "");
    }

    #[test]
    fn test_empty_output_still_has_header() {
        let rows = written(&[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0), Some("reference"));
    }

    #[test]
    fn test_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("output.csv");
        let mut sink = CsvSink::new(&path);
        sink.write(&[sample()]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("reference,full_name,"));
        assert_eq!(content.lines().count(), 2);
    }
}
