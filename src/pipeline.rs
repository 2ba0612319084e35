//! Runs the full derivation over one snapshot: resolve columns, coerce and
//! derive each record, then aggregate.

use std::collections::BTreeMap;

use log::info;
use serde::Serialize;

use crate::{
    aggregate::{self, CategoryTotals, FarmTotals, MilkSeries},
    config::PipelineConfig,
    data::RecordSet,
    derive::{self, DerivedRecord},
    error::{Notice, SourceError},
    resolve::{self, LogicalField, ResolvedColumns},
    source::RecordSource,
};

/// Everything the display layer consumes for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Source headers in first-seen order; every record's `source` cells
    /// fall under these.
    pub headers: Vec<String>,
    pub columns: BTreeMap<LogicalField, String>,
    pub records: Vec<DerivedRecord>,
    pub totals: FarmTotals,
    pub top_profit: Vec<DerivedRecord>,
    pub top_expense: Vec<DerivedRecord>,
    pub reorder_alerts: Vec<DerivedRecord>,
    pub categories: Vec<CategoryTotals>,
    pub milk: MilkSeries,
    pub notices: Vec<Notice>,
}

impl Report {
    pub fn unparseable_count(&self) -> usize {
        self.notices
            .iter()
            .filter(|n| matches!(n, Notice::UnparseableValue { .. }))
            .count()
    }
}

pub fn resolve_for(records: &RecordSet, config: &PipelineConfig) -> ResolvedColumns {
    resolve::resolve_columns(
        records.headers(),
        &config.alias_table(),
        config.header_matching,
    )
}

pub fn run(records: &RecordSet, config: &PipelineConfig) -> Report {
    let columns = resolve_for(records, config);
    let mut notices = columns.notices();

    let (derived, mut cell_notices) = derive::derive_all(records, &columns, config);
    notices.append(&mut cell_notices);

    let cloned = |rows: Vec<&DerivedRecord>| rows.into_iter().cloned().collect::<Vec<_>>();
    let totals = aggregate::farm_totals(&derived);
    if totals.overflowed > 0 {
        notices.push(Notice::TotalOverflow {
            aggregate: "farm totals".to_string(),
            skipped: totals.overflowed,
        });
    }
    let top_profit = cloned(aggregate::top_by_profit(&derived, config.top_n));
    let top_expense = cloned(aggregate::top_by_expense(&derived, config.top_n));
    let reorder_alerts = cloned(aggregate::reorder_alerts(
        &derived,
        config.reorder_threshold,
        config.use_record_thresholds,
    ));
    let categories = aggregate::category_totals(&derived);
    let milk = aggregate::milk_series(&derived);

    info!(
        "Derived {} record(s): income {}, expenses {}, {} reorder alert(s), {} notice(s)",
        derived.len(),
        totals.total_income,
        totals.total_expenses,
        reorder_alerts.len(),
        notices.len()
    );

    Report {
        headers: records.headers().to_vec(),
        columns: columns
            .resolved()
            .map(|(field, column)| (field, column.to_string()))
            .collect(),
        records: derived,
        totals,
        top_profit,
        top_expense,
        reorder_alerts,
        categories,
        milk,
        notices,
    }
}

/// Fetches a fresh snapshot and runs the pipeline. A failed fetch produces
/// no report at all.
pub fn fetch_and_run(
    source: &dyn RecordSource,
    config: &PipelineConfig,
) -> Result<Report, SourceError> {
    let records = source.fetch()?;
    Ok(run(&records, config))
}
