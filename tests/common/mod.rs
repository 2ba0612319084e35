#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use herd_ledger::config::PipelineConfig;
use rust_decimal::Decimal;
use tempfile::TempDir;

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

pub fn dec(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

/// Prices 5/3/4, threshold 50, top 3 (see `tests/data/herd_config.yml`).
pub fn fixture_config() -> PipelineConfig {
    PipelineConfig::load(&fixture_path("herd_config.yml")).expect("load fixture config")
}

/// Temporary directory for exports and config files written by a test.
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    /// Path of `name` inside the scratch directory; the file need not exist.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.file(name);
        fs::write(&path, contents).expect("write scratch file");
        path
    }
}
