//! Error and notice types shared across the pipeline.
//!
//! Fatal failures (the source could not be read, the configuration is
//! invalid) are `thiserror` enums that callers propagate with `?`. Everything
//! that happens while resolving columns or coercing cells is recovered
//! locally and reported as a [`Notice`] instead.

use std::{fmt, path::PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::resolve::LogicalField;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parsing CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parsing JSON records: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to decode text with encoding {0}")]
    Decode(&'static str),

    #[error("Unknown encoding '{0}'")]
    Encoding(String),

    #[error("Unexpected record layout: {0}")]
    Shape(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Opening config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parsing config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{field} must be non-negative (got {value})")]
    Negative { field: &'static str, value: String },

    #[error("top_n must be at least 1")]
    ZeroTopN,

    #[error("Alias list for {0} is empty")]
    EmptyAliases(LogicalField),

    #[error("Invalid date format '{0}'")]
    DateFormat(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoercionError {
    #[error("value is empty")]
    Empty,

    #[error("'{0}' is not a number")]
    NotNumeric(String),

    #[error("'{0}' is not a recognised date")]
    NotDate(String),
}

/// A non-fatal observation surfaced alongside the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    UnresolvedField {
        field: LogicalField,
    },
    UnparseableValue {
        row: usize,
        column: String,
        raw: String,
    },
    /// A derived metric exceeded the decimal range and is left missing.
    MetricOverflow {
        row: usize,
        metric: String,
    },
    /// Values left out of a farm-level sum because adding them overflowed.
    TotalOverflow {
        aggregate: String,
        skipped: usize,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::UnresolvedField { field } => write!(
                f,
                "No column found for {field}; dependent metrics are skipped or zero-filled"
            ),
            Notice::UnparseableValue { row, column, raw } => {
                write!(f, "Row {row}: '{raw}' in column '{column}' treated as missing")
            }
            Notice::MetricOverflow { row, metric } => {
                write!(f, "Row {row}: {metric} is out of range and treated as missing")
            }
            Notice::TotalOverflow { aggregate, skipped } => write!(
                f,
                "{skipped} value(s) left out of {aggregate} because the sum is out of range"
            ),
        }
    }
}
