//! Pipeline and source configuration.
//!
//! Everything the derivation needs is carried in an explicit
//! [`PipelineConfig`] value: unit milk prices, the reorder threshold, the
//! missing-value policy, header matching, and the alias table. The struct is
//! loadable from YAML (every key optional) and individual fields can be
//! overridden from the command line afterwards.

use std::{
    collections::BTreeMap,
    fmt::Write as _,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    coerce::default_date_formats,
    error::ConfigError,
    resolve::{AliasTable, HeaderMatching, LogicalField},
};

pub const DEFAULT_TOP_N: usize = 5;

/// How derivation treats inputs that are unresolved or missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DerivationMode {
    /// Missing session volumes and cost fields count as zero.
    #[default]
    Lenient,
    /// Income and expenses require every contributing field in the record.
    Strict,
}

/// Unit milk price per milking session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pricing {
    pub morning: Decimal,
    pub mid_morning: Decimal,
    pub evening: Decimal,
}

impl Pricing {
    pub fn uniform(price: Decimal) -> Self {
        Self {
            morning: price,
            mid_morning: price,
            evening: price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pricing: Pricing,
    pub reorder_threshold: Decimal,
    /// Prefer a record's own reorder-threshold cell over `reorder_threshold`.
    pub use_record_thresholds: bool,
    pub top_n: usize,
    pub mode: DerivationMode,
    pub header_matching: HeaderMatching,
    pub date_formats: Vec<String>,
    /// Per-field replacements for the built-in alias lists.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<LogicalField, Vec<String>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pricing: Pricing::default(),
            reorder_threshold: Decimal::ZERO,
            use_record_thresholds: false,
            top_n: DEFAULT_TOP_N,
            mode: DerivationMode::default(),
            header_matching: HeaderMatching::default(),
            date_formats: default_date_formats(),
            aliases: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("pricing.morning", self.pricing.morning),
            ("pricing.mid_morning", self.pricing.mid_morning),
            ("pricing.evening", self.pricing.evening),
            ("reorder_threshold", self.reorder_threshold),
        ];
        for (field, value) in checks {
            if value < Decimal::ZERO {
                return Err(ConfigError::Negative {
                    field,
                    value: value.to_string(),
                });
            }
        }
        if self.top_n == 0 {
            return Err(ConfigError::ZeroTopN);
        }
        if let Some((field, _)) = self.aliases.iter().find(|(_, list)| list.is_empty()) {
            return Err(ConfigError::EmptyAliases(*field));
        }
        for fmt in &self.date_formats {
            if !date_format_round_trips(fmt) {
                return Err(ConfigError::DateFormat(fmt.clone()));
            }
        }
        Ok(())
    }

    pub fn alias_table(&self) -> AliasTable {
        AliasTable::default().with_overrides(&self.aliases)
    }

    /// The default configuration with the full alias table spelled out, as
    /// written by `init-config`.
    pub fn template_yaml() -> Result<String, ConfigError> {
        #[derive(Serialize)]
        struct Template<'a> {
            #[serde(flatten)]
            config: &'a PipelineConfig,
            aliases: AliasTable,
        }
        let mut config = PipelineConfig::default();
        config.pricing = Pricing::uniform(Decimal::ONE);
        Ok(serde_yaml::to_string(&Template {
            config: &config,
            aliases: AliasTable::default(),
        })?)
    }
}

/// A usable format must render a date it can parse back unchanged.
fn date_format_round_trips(fmt: &str) -> bool {
    let Some(probe) = NaiveDate::from_ymd_opt(2024, 11, 23) else {
        return false;
    };
    let mut rendered = String::new();
    if write!(rendered, "{}", probe.format(fmt)).is_err() {
        return false;
    }
    NaiveDate::parse_from_str(&rendered, fmt).is_ok_and(|parsed| parsed == probe)
}

/// Which export to read the herd snapshot from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    Csv {
        path: PathBuf,
        delimiter: Option<u8>,
        encoding: Option<String>,
    },
    Json {
        path: PathBuf,
    },
}
