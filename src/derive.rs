//! Per-record metric derivation: income, expenses, profit, total milk and
//! expected birth date.

use chrono::{Days, NaiveDate};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    coerce::{coerce_date, coerce_number, coerce_text, parse_date, parse_number},
    config::{DerivationMode, PipelineConfig, Pricing},
    data::{RawValue, Record, RecordSet},
    error::{CoercionError, Notice},
    resolve::{LogicalField, ResolvedColumns},
};

/// Days from insemination to expected calving.
pub const GESTATION_DAYS: u64 = 283;

const SESSIONS: [LogicalField; 3] = [
    LogicalField::MilkMorning,
    LogicalField::MilkMidMorning,
    LogicalField::MilkEvening,
];

/// A record's coerced inputs and derived metrics. Derived values are
/// computed once per run and never read back as inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedRecord {
    /// Zero-based position in the fetched snapshot.
    pub row: usize,
    /// 1-based row in the source sheet, as quoted in notices.
    pub source_row: usize,
    pub id: Option<String>,
    pub category: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub insemination_date: Option<NaiveDate>,
    pub feed_stock: Option<Decimal>,
    pub reorder_threshold: Option<Decimal>,
    pub valuation: Option<Decimal>,
    pub milk_morning: Option<Decimal>,
    pub milk_mid_morning: Option<Decimal>,
    pub milk_evening: Option<Decimal>,
    pub total_milk: Option<Decimal>,
    pub income: Option<Decimal>,
    pub total_expenses: Option<Decimal>,
    pub profit: Option<Decimal>,
    pub expected_birth_date: Option<NaiveDate>,
    /// The record's original cells, in source column order.
    pub source: Record,
}

impl DerivedRecord {
    /// Identifier for display, falling back to the source row number.
    pub fn label(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("row {}", self.source_row))
    }

    fn session(&self, field: LogicalField) -> Option<Decimal> {
        match field {
            LogicalField::MilkMorning => self.milk_morning,
            LogicalField::MilkMidMorning => self.milk_mid_morning,
            LogicalField::MilkEvening => self.milk_evening,
            _ => None,
        }
    }
}

fn session_price(pricing: &Pricing, field: LogicalField) -> Decimal {
    match field {
        LogicalField::MilkMorning => pricing.morning,
        LogicalField::MilkMidMorning => pricing.mid_morning,
        LogicalField::MilkEvening => pricing.evening,
        _ => Decimal::ZERO,
    }
}

pub fn expected_birth_date(insemination: NaiveDate) -> Option<NaiveDate> {
    insemination.checked_add_days(Days::new(GESTATION_DAYS))
}

/// A sum or product left the `Decimal` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Overflow;

/// `Ok(None)` when inputs are missing, `Err` when the arithmetic overflowed.
type Metric = Result<Option<Decimal>, Overflow>;

fn checked_total<I>(values: I) -> Result<Decimal, Overflow>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(value).ok_or(Overflow))
}

/// Reads and coerces the cells of one record, recording a notice for every
/// non-empty cell that fails to coerce.
struct CellReader<'a> {
    source_row: usize,
    record: &'a Record,
    columns: &'a ResolvedColumns,
    date_formats: &'a [String],
    notices: Vec<Notice>,
}

impl<'a> CellReader<'a> {
    fn raw(&self, field: LogicalField) -> Option<(&'a str, &'a RawValue)> {
        let columns: &'a ResolvedColumns = self.columns;
        let record: &'a Record = self.record;
        let column = columns.column(field)?;
        record.get(column).map(|value| (column, value))
    }

    fn text(&self, field: LogicalField) -> Option<String> {
        self.raw(field).and_then(|(_, value)| coerce_text(value))
    }

    fn number(&mut self, field: LogicalField) -> Option<Decimal> {
        let (column, value) = self.raw(field)?;
        let coerced = coerce_number(value);
        if coerced.is_none() {
            let reason = match value {
                RawValue::Text(text) => parse_number(text).err(),
                RawValue::Number(_) => Some(CoercionError::NotNumeric(value.as_display())),
                RawValue::Blank => None,
            };
            self.note(column, value, reason);
        }
        coerced
    }

    fn date(&mut self, field: LogicalField) -> Option<NaiveDate> {
        let (column, value) = self.raw(field)?;
        let coerced = coerce_date(value, self.date_formats);
        if coerced.is_none() {
            let reason = match value {
                RawValue::Text(text) => parse_date(text, self.date_formats).err(),
                RawValue::Number(_) => Some(CoercionError::NotDate(value.as_display())),
                RawValue::Blank => None,
            };
            self.note(column, value, reason);
        }
        coerced
    }

    fn note(&mut self, column: &str, value: &RawValue, reason: Option<CoercionError>) {
        match reason {
            None | Some(CoercionError::Empty) => {}
            Some(err) => {
                debug!("Row {}: column '{column}': {err}", self.source_row);
                self.notices.push(Notice::UnparseableValue {
                    row: self.source_row,
                    column: column.to_string(),
                    raw: value.as_display(),
                });
            }
        }
    }

    fn settle(&mut self, metric: &str, value: Metric) -> Option<Decimal> {
        value.unwrap_or_else(|Overflow| {
            warn!("Row {}: {metric} is out of range", self.source_row);
            self.notices.push(Notice::MetricOverflow {
                row: self.source_row,
                metric: metric.to_string(),
            });
            None
        })
    }
}

/// Derives one record. `row` is the record's zero-based position.
pub fn derive_record(
    row: usize,
    record: &Record,
    columns: &ResolvedColumns,
    config: &PipelineConfig,
) -> (DerivedRecord, Vec<Notice>) {
    let source_row = record.source_row().unwrap_or(row + 1);
    let mut cells = CellReader {
        source_row,
        record,
        columns,
        date_formats: &config.date_formats,
        notices: Vec::new(),
    };

    let mut derived = DerivedRecord {
        row,
        source_row,
        source: record.clone(),
        id: cells.text(LogicalField::Id),
        category: cells.text(LogicalField::Category),
        date_of_birth: cells.date(LogicalField::DateOfBirth),
        insemination_date: cells.date(LogicalField::InseminationDate),
        feed_stock: cells.number(LogicalField::FeedStock),
        reorder_threshold: cells.number(LogicalField::ReorderThreshold),
        valuation: cells.number(LogicalField::Valuation),
        milk_morning: cells.number(LogicalField::MilkMorning),
        milk_mid_morning: cells.number(LogicalField::MilkMidMorning),
        milk_evening: cells.number(LogicalField::MilkEvening),
        ..DerivedRecord::default()
    };
    let costs = LogicalField::COSTS
        .iter()
        .map(|field| cells.number(*field))
        .collect::<Vec<_>>();

    let (total_milk, income) = milk_and_income(&derived, columns, config);
    derived.total_milk = cells.settle("total_milk", total_milk);
    derived.income = cells.settle("income", income);
    derived.total_expenses = cells.settle("total_expenses", total_expenses(&costs, config.mode));
    let profit = match (derived.income, derived.total_expenses) {
        (Some(income), Some(expenses)) => income.checked_sub(expenses).ok_or(Overflow).map(Some),
        _ => Ok(None),
    };
    derived.profit = cells.settle("profit", profit);
    derived.expected_birth_date = derived.insemination_date.and_then(expected_birth_date);

    (derived, cells.notices)
}

fn milk_and_income(
    derived: &DerivedRecord,
    columns: &ResolvedColumns,
    config: &PipelineConfig,
) -> (Metric, Metric) {
    if config.mode == DerivationMode::Lenient
        && !SESSIONS.iter().any(|field| columns.is_resolved(*field))
    {
        return (Ok(None), Ok(None));
    }
    let mut volumes = Vec::with_capacity(SESSIONS.len());
    for field in SESSIONS {
        let volume = match (derived.session(field), config.mode) {
            (Some(volume), _) => volume,
            (None, DerivationMode::Lenient) => Decimal::ZERO,
            (None, DerivationMode::Strict) => return (Ok(None), Ok(None)),
        };
        volumes.push((field, volume));
    }

    let milk = checked_total(volumes.iter().map(|(_, volume)| *volume)).map(Some);
    let income = volumes
        .iter()
        .map(|(field, volume)| {
            volume
                .checked_mul(session_price(&config.pricing, *field))
                .ok_or(Overflow)
        })
        .collect::<Result<Vec<_>, _>>()
        .and_then(|amounts| checked_total(amounts))
        .map(Some);
    (milk, income)
}

fn total_expenses(costs: &[Option<Decimal>], mode: DerivationMode) -> Metric {
    match mode {
        DerivationMode::Lenient => checked_total(costs.iter().flatten().copied()).map(Some),
        DerivationMode::Strict => match costs.iter().copied().collect::<Option<Vec<_>>>() {
            Some(values) => checked_total(values).map(Some),
            None => Ok(None),
        },
    }
}

/// Derives every record in snapshot order.
pub fn derive_all(
    records: &RecordSet,
    columns: &ResolvedColumns,
    config: &PipelineConfig,
) -> (Vec<DerivedRecord>, Vec<Notice>) {
    let mut derived = Vec::with_capacity(records.len());
    let mut notices = Vec::new();
    for (row, record) in records.records().iter().enumerate() {
        let (metrics, mut record_notices) = derive_record(row, record, columns, config);
        derived.push(metrics);
        notices.append(&mut record_notices);
    }
    (derived, notices)
}
