//! Farm-level aggregation and ranking over derived records.
//!
//! Every function here is pure: it reads the derived records and returns new
//! values, leaving the input untouched and in its original order.

use std::cmp::Reverse;

use itertools::Itertools;
use log::warn;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::derive::DerivedRecord;

pub const UNCATEGORIZED: &str = "uncategorized";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FarmTotals {
    pub records: usize,
    pub records_with_income: usize,
    pub records_with_expenses: usize,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    /// Saturates at the `Decimal` bounds.
    pub net_profit: Decimal,
    /// Break-even counts as profitable.
    pub is_profitable: bool,
    /// Values left out of the sums above because adding them overflowed.
    pub overflowed: usize,
}

/// Adds `value` into `total`. On overflow `total` is left unchanged and
/// `false` is returned.
fn accumulate(total: &mut Decimal, value: Decimal) -> bool {
    match total.checked_add(value) {
        Some(sum) => {
            *total = sum;
            true
        }
        None => false,
    }
}

pub fn farm_totals(records: &[DerivedRecord]) -> FarmTotals {
    let mut totals = FarmTotals {
        records: records.len(),
        ..FarmTotals::default()
    };
    for record in records {
        if let Some(income) = record.income {
            totals.records_with_income += 1;
            if !accumulate(&mut totals.total_income, income) {
                warn!("Income of {} left out of the farm total", record.label());
                totals.overflowed += 1;
            }
        }
        if let Some(expenses) = record.total_expenses {
            totals.records_with_expenses += 1;
            if !accumulate(&mut totals.total_expenses, expenses) {
                warn!("Expenses of {} left out of the farm total", record.label());
                totals.overflowed += 1;
            }
        }
    }
    totals.net_profit = totals.total_income.saturating_sub(totals.total_expenses);
    totals.is_profitable = is_profitable(totals.total_income, totals.total_expenses);
    totals
}

pub fn is_profitable(total_income: Decimal, total_expenses: Decimal) -> bool {
    total_income >= total_expenses
}

fn top_by<F>(records: &[DerivedRecord], k: usize, key: F) -> Vec<&DerivedRecord>
where
    F: Fn(&DerivedRecord) -> Option<Decimal>,
{
    // `sorted_by_key` is a stable sort, so equal keys keep snapshot order.
    records
        .iter()
        .filter_map(|r| key(r).map(|value| (Reverse(value), r)))
        .sorted_by_key(|(value, _)| *value)
        .take(k)
        .map(|(_, r)| r)
        .collect()
}

/// The `k` most profitable records, highest first.
pub fn top_by_profit(records: &[DerivedRecord], k: usize) -> Vec<&DerivedRecord> {
    top_by(records, k, |r| r.profit)
}

/// The `k` records with the largest total expenses, highest first.
pub fn top_by_expense(records: &[DerivedRecord], k: usize) -> Vec<&DerivedRecord> {
    top_by(records, k, |r| r.total_expenses)
}

/// Records whose feed stock is at or below the threshold. With
/// `use_record_thresholds`, a record's own threshold cell takes precedence.
pub fn reorder_alerts(
    records: &[DerivedRecord],
    threshold: Decimal,
    use_record_thresholds: bool,
) -> Vec<&DerivedRecord> {
    records
        .iter()
        .filter(|r| {
            let limit = if use_record_thresholds {
                r.reorder_threshold.unwrap_or(threshold)
            } else {
                threshold
            };
            r.feed_stock.is_some_and(|stock| stock <= limit)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotals {
    pub category: String,
    pub records: usize,
    pub income: Decimal,
    pub expenses: Decimal,
    pub profit: Decimal,
}

/// Income and expense totals per category, in first-seen order.
pub fn category_totals(records: &[DerivedRecord]) -> Vec<CategoryTotals> {
    let mut groups: Vec<CategoryTotals> = Vec::new();
    for record in records {
        let name = record.category.as_deref().unwrap_or(UNCATEGORIZED);
        let idx = match groups.iter().position(|g| g.category == name) {
            Some(idx) => idx,
            None => {
                groups.push(CategoryTotals {
                    category: name.to_string(),
                    records: 0,
                    income: Decimal::ZERO,
                    expenses: Decimal::ZERO,
                    profit: Decimal::ZERO,
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[idx];
        group.records += 1;
        let income = record.income.unwrap_or_default();
        let expenses = record.total_expenses.unwrap_or_default();
        let kept_income = accumulate(&mut group.income, income);
        let kept_expenses = accumulate(&mut group.expenses, expenses);
        if !(kept_income && kept_expenses) {
            warn!("{} left out of category '{name}': sum out of range", record.label());
        }
        group.profit = group.income.saturating_sub(group.expenses);
    }
    groups
}

/// Farm-wide milk volume per session, for charting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MilkSeries {
    pub morning: Decimal,
    pub mid_morning: Decimal,
    pub evening: Decimal,
    pub total: Decimal,
}

pub fn milk_series(records: &[DerivedRecord]) -> MilkSeries {
    let mut series = MilkSeries::default();
    for record in records {
        let sessions = [
            (&mut series.morning, record.milk_morning),
            (&mut series.mid_morning, record.milk_mid_morning),
            (&mut series.evening, record.milk_evening),
        ];
        for (total, volume) in sessions {
            if !accumulate(total, volume.unwrap_or_default()) {
                warn!("Milk of {} left out of the session series", record.label());
            }
        }
    }
    series.total = series
        .morning
        .saturating_add(series.mid_morning)
        .saturating_add(series.evening);
    series
}
