//! Record sources: where a herd snapshot comes from.
//!
//! A [`RecordSource`] returns the whole snapshot or fails; there is no
//! partial fetch. The pipeline never sees a half-read table.

use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use log::{debug, info};
use serde_json::Value as JsonValue;

use crate::{
    config::SourceConfig,
    data::{RawValue, Record, RecordSet},
    error::SourceError,
    io_utils,
};

pub trait RecordSource {
    fn fetch(&self) -> Result<RecordSet, SourceError>;

    /// Human-readable origin used in log lines.
    fn describe(&self) -> String;
}

/// A CSV (or TSV) export of the herd sheet.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
    encoding: &'static Encoding,
}

impl CsvSource {
    pub fn new(
        path: &Path,
        delimiter: Option<u8>,
        encoding: Option<&str>,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            path: path.to_path_buf(),
            delimiter: io_utils::resolve_input_delimiter(path, delimiter),
            encoding: io_utils::resolve_encoding(encoding)?,
        })
    }
}

impl RecordSource for CsvSource {
    fn fetch(&self) -> Result<RecordSet, SourceError> {
        let input = io_utils::open_input(&self.path)?;
        let mut reader = io_utils::open_csv_reader(input, self.delimiter);
        let headers = io_utils::reader_headers(&mut reader, self.encoding)?;
        let mut set = RecordSet::new(headers.clone());

        for (row_idx, record) in reader.byte_records().enumerate() {
            let record = record?;
            let decoded = io_utils::decode_record(&record, self.encoding)?;
            // Physical line numbers count empty lines the reader drops; the
            // header occupies line 1.
            let source_row = record
                .position()
                .and_then(|pos| usize::try_from(pos.line()).ok())
                .map_or(row_idx + 1, |line| line.saturating_sub(1));
            let mut row = Record::new().at_source_row(source_row);
            for (idx, header) in headers.iter().enumerate() {
                // Duplicate headers keep the leftmost column.
                if row.get(header).is_some() {
                    continue;
                }
                let cell = decoded.get(idx).map(String::as_str).unwrap_or("");
                row.insert(header.as_str(), RawValue::from(cell));
            }
            if row.is_blank() {
                debug!("Skipping blank row {source_row}");
                continue;
            }
            set.push(row);
        }
        info!(
            "Read {} record(s) with {} column(s) from {}",
            set.len(),
            set.headers().len(),
            self.describe()
        );
        Ok(set)
    }

    fn describe(&self) -> String {
        if io_utils::is_dash(&self.path) {
            "stdin".to_string()
        } else {
            format!("{:?}", self.path)
        }
    }
}

/// A JSON export: an array of flat objects, one per animal.
#[derive(Debug, Clone)]
pub struct JsonSource {
    path: PathBuf,
}

impl JsonSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl RecordSource for JsonSource {
    fn fetch(&self) -> Result<RecordSet, SourceError> {
        let input = io_utils::open_input(&self.path)?;
        let document: JsonValue = serde_json::from_reader(input)?;
        let set = records_from_json(document)?;
        info!(
            "Read {} record(s) with {} column(s) from {}",
            set.len(),
            set.headers().len(),
            self.describe()
        );
        Ok(set)
    }

    fn describe(&self) -> String {
        if io_utils::is_dash(&self.path) {
            "stdin".to_string()
        } else {
            format!("{:?}", self.path)
        }
    }
}

pub fn records_from_json(document: JsonValue) -> Result<RecordSet, SourceError> {
    let JsonValue::Array(rows) = document else {
        return Err(SourceError::Shape(
            "expected a JSON array of record objects".to_string(),
        ));
    };
    let mut set = RecordSet::default();
    for (idx, row) in rows.into_iter().enumerate() {
        let JsonValue::Object(fields) = row else {
            return Err(SourceError::Shape(format!(
                "record {} is not an object",
                idx + 1
            )));
        };
        let mut record = Record::new().at_source_row(idx + 1);
        for (column, value) in fields {
            let raw = match value {
                JsonValue::Null => RawValue::Blank,
                JsonValue::String(s) => RawValue::from(s.as_str()),
                JsonValue::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Blank),
                JsonValue::Bool(b) => RawValue::Text(if b { "TRUE" } else { "FALSE" }.to_string()),
                JsonValue::Array(_) | JsonValue::Object(_) => {
                    return Err(SourceError::Shape(format!(
                        "record {} column '{column}' holds a nested value",
                        idx + 1
                    )));
                }
            };
            record.insert(column, raw);
        }
        set.push(record);
    }
    Ok(set)
}

pub fn from_config(config: &SourceConfig) -> Result<Box<dyn RecordSource>, SourceError> {
    Ok(match config {
        SourceConfig::Csv {
            path,
            delimiter,
            encoding,
        } => Box::new(CsvSource::new(path, *delimiter, encoding.as_deref())?),
        SourceConfig::Json { path } => Box::new(JsonSource::new(path)),
    })
}
