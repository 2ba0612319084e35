use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use crate::{
    config::{DerivationMode, PipelineConfig, SourceConfig},
    resolve::HeaderMatching,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Farm economics from dairy herd spreadsheet exports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Derive income, expenses, profit, rankings and reorder alerts
    Report(ReportArgs),
    /// List the snapshot's column names and the fields they resolve to
    Columns(ColumnsArgs),
    /// Re-run the report on a fixed interval
    Watch(WatchArgs),
    /// Write a configuration file with defaults and the full alias table
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum InputFormat {
    /// Pick from the file extension (.json is JSON, anything else CSV)
    #[default]
    Auto,
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Herd export to read (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Format of the export
    #[arg(long = "input-format", value_enum, default_value = "auto")]
    pub input_format: InputFormat,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of a CSV export (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

impl SourceArgs {
    pub fn source_config(&self) -> SourceConfig {
        let json = match self.input_format {
            InputFormat::Json => true,
            InputFormat::Csv => false,
            InputFormat::Auto => has_extension(&self.input, "json"),
        };
        if json {
            SourceConfig::Json {
                path: self.input.clone(),
            }
        } else {
            SourceConfig::Csv {
                path: self.input.clone(),
                delimiter: self.delimiter,
                encoding: self.input_encoding.clone(),
            }
        }
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

#[derive(Debug, Clone, Default, Args)]
pub struct PipelineArgs {
    /// YAML configuration file (prices, threshold, aliases)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Unit milk price applied to every session unless overridden below
    #[arg(long = "price")]
    pub price: Option<Decimal>,
    /// Unit price for morning milk
    #[arg(long = "price-morning")]
    pub price_morning: Option<Decimal>,
    /// Unit price for mid-morning milk
    #[arg(long = "price-mid-morning")]
    pub price_mid_morning: Option<Decimal>,
    /// Unit price for evening milk
    #[arg(long = "price-evening")]
    pub price_evening: Option<Decimal>,
    /// Feed stock at or below this level raises a reorder alert
    #[arg(long = "reorder-threshold")]
    pub reorder_threshold: Option<Decimal>,
    /// Use each record's own reorder level when it has one (`false` turns a
    /// configured `true` off)
    #[arg(
        long = "use-record-thresholds",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub use_record_thresholds: Option<bool>,
    /// Number of records in each ranking
    #[arg(long = "top")]
    pub top: Option<usize>,
    /// Treatment of missing inputs (lenient zero-fills, strict drops the metric)
    #[arg(long = "mode", value_enum)]
    pub mode: Option<DerivationMode>,
    /// How header names are compared against aliases
    #[arg(long = "header-matching", value_enum)]
    pub header_matching: Option<HeaderMatching>,
}

impl PipelineArgs {
    /// Applies command-line overrides on top of a loaded configuration.
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(price) = self.price {
            config.pricing.morning = price;
            config.pricing.mid_morning = price;
            config.pricing.evening = price;
        }
        if let Some(price) = self.price_morning {
            config.pricing.morning = price;
        }
        if let Some(price) = self.price_mid_morning {
            config.pricing.mid_morning = price;
        }
        if let Some(price) = self.price_evening {
            config.pricing.evening = price;
        }
        if let Some(threshold) = self.reorder_threshold {
            config.reorder_threshold = threshold;
        }
        if let Some(flag) = self.use_record_thresholds {
            config.use_record_thresholds = flag;
        }
        if let Some(top) = self.top {
            config.top_n = top;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(matching) = self.header_matching {
            config.header_matching = matching;
        }
    }
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    /// How to print the report on stdout
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormat,
    /// Also write the enriched record table as CSV to this path
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// YAML configuration file providing alias overrides
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// How header names are compared against aliases
    #[arg(long = "header-matching", value_enum)]
    pub header_matching: Option<HeaderMatching>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    /// How to print each report
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormat,
    /// Seconds between refreshes
    #[arg(long = "interval", default_value_t = 60)]
    pub interval: u64,
    /// Stop after this many refreshes (runs until interrupted if omitted)
    #[arg(long = "iterations")]
    pub iterations: Option<usize>,
}

#[derive(Debug, Args)]
pub struct InitConfigArgs {
    /// Destination YAML file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
