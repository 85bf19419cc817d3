use crate::app::ports::RecordSink;
use crate::error::{EtlError, Result};
use crate::observability::metrics;
use crate::pipeline::ingestion::schema::output_header;
use crate::types::Record;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads the output dataset into a SQLite table, replacing it on every run.
pub struct SqliteSink {
    conn: Connection,
    table: String,
}

/// Database file named by a `DEV_DB_URL`-style value: a plain path or a
/// `sqlite://` / `file:` URL.
pub fn path_from_url(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .or_else(|| url.strip_prefix("file:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

fn column_type(column: &str) -> &'static str {
    match column {
        "latitude" | "longitude" => "REAL",
        "year_birth" | "year_death" => "INTEGER",
        _ => "TEXT",
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn json_to_sql(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(i64::from(b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map(Value::Real).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::Text(s),
        other => Value::Text(other.to_string()),
    }
}

impl SqliteSink {
    pub fn open<P: AsRef<Path>>(path: P, table: &str) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    pub fn open_in_memory(table: &str) -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            table: table.to_string(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn row_count(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Drop and recreate the table, then insert all rows in one transaction.
    fn replace_table<I>(&mut self, columns: &[String], rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<Vec<Value>>>,
    {
        let table = quote_ident(&self.table);
        let definitions: Vec<String> = columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(c), column_type(c)))
            .collect();
        let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};\nCREATE TABLE {table} ({});",
            definitions.join(", ")
        ))?;

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                names.join(", "),
                placeholders.join(", ")
            ))?;
            for row in rows {
                let row = row?;
                stmt.execute(params_from_iter(row.iter()))?;
                inserted += 1;
            }
        }
        tx.commit()?;

        debug!("Replaced table {} with {} rows", self.table, inserted);
        Ok(inserted)
    }

    /// Load a previously written output CSV; empty cells become NULL.
    pub fn load_csv<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if columns.is_empty() {
            return Err(EtlError::MalformedInput {
                row: 1,
                message: format!("'{}' has no header", path.display()),
            });
        }

        let width = columns.len();
        let rows = reader.into_records().enumerate().map(|(index, row)| -> Result<Vec<Value>> {
            let row = row?;
            if row.len() != width {
                return Err(EtlError::MalformedInput {
                    row: index + 2,
                    message: format!("expected {} fields, found {}", width, row.len()),
                });
            }
            Ok(row
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Value::Null
                    } else {
                        Value::Text(cell.to_string())
                    }
                })
                .collect())
        });

        let inserted = self.replace_table(&columns, rows)?;
        info!("Loaded {} rows from {} into {}", inserted, path.display(), self.table);
        Ok(inserted)
    }
}

impl RecordSink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn write(&mut self, records: &[Record]) -> Result<()> {
        let columns: Vec<String> = output_header().into_iter().map(str::to_string).collect();
        let rows = records.iter().map(|record| -> Result<Vec<Value>> {
            let mut object = match serde_json::to_value(record)? {
                serde_json::Value::Object(map) => map,
                _ => return Ok(vec![Value::Null; columns.len()]),
            };
            Ok(columns
                .iter()
                .map(|c| json_to_sql(object.remove(c).unwrap_or(serde_json::Value::Null)))
                .collect())
        });

        let inserted = self.replace_table(&columns, rows)?;
        metrics::records::written(self.name(), inserted);
        info!("Loaded {} records into table {}", inserted, self.table);
        Ok(())
    }
}
