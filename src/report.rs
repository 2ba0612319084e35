//! Rendering of a [`Report`] as plain-text tables, JSON, or an enriched CSV.

use std::{fmt::Write as _, path::Path};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    data::RawValue,
    derive::DerivedRecord,
    io_utils,
    pipeline::Report,
    table::TextTable,
};

const MISSING: &str = "-";

pub const RECORD_COLUMNS: &[&str] = &[
    "id",
    "category",
    "date_of_birth",
    "insemination_date",
    "milk_morning",
    "milk_mid_morning",
    "milk_evening",
    "total_milk",
    "income",
    "total_expenses",
    "profit",
    "expected_birth_date",
    "feed_stock",
    "valuation",
];

/// Appended after the source columns in the enriched CSV.
pub const DERIVED_COLUMNS: &[&str] = &[
    "total_milk",
    "income",
    "total_expenses",
    "profit",
    "expected_birth_date",
];

pub fn format_decimal(value: Option<Decimal>) -> String {
    value
        .map(|v| v.normalize().to_string())
        .unwrap_or_default()
}

fn format_date(value: Option<NaiveDate>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn or_missing(value: String) -> String {
    if value.is_empty() {
        MISSING.to_string()
    } else {
        value
    }
}

fn record_cells(record: &DerivedRecord) -> Vec<String> {
    vec![
        record.id.clone().unwrap_or_default(),
        record.category.clone().unwrap_or_default(),
        format_date(record.date_of_birth),
        format_date(record.insemination_date),
        format_decimal(record.milk_morning),
        format_decimal(record.milk_mid_morning),
        format_decimal(record.milk_evening),
        format_decimal(record.total_milk),
        format_decimal(record.income),
        format_decimal(record.total_expenses),
        format_decimal(record.profit),
        format_date(record.expected_birth_date),
        format_decimal(record.feed_stock),
        format_decimal(record.valuation),
    ]
}

fn derived_cells(record: &DerivedRecord) -> [String; 5] {
    [
        format_decimal(record.total_milk),
        format_decimal(record.income),
        format_decimal(record.total_expenses),
        format_decimal(record.profit),
        format_date(record.expected_birth_date),
    ]
}

fn ranking_table(
    metric: &str,
    rows: &[DerivedRecord],
    value: fn(&DerivedRecord) -> Option<Decimal>,
) -> TextTable {
    let mut table = TextTable::new(["#", "cow", metric]).align_right(&[0, 2]);
    for (idx, record) in rows.iter().enumerate() {
        table.push(vec![
            (idx + 1).to_string(),
            record.label(),
            or_missing(format_decimal(value(record))),
        ]);
    }
    table
}

fn section(output: &mut String, title: &str, table: &TextTable) {
    let _ = writeln!(output, "== {title}");
    if table.is_empty() {
        let _ = writeln!(output, "(none)");
    } else {
        output.push_str(&table.render());
    }
    output.push('\n');
}

pub fn render_text(report: &Report) -> String {
    let mut output = String::new();
    let totals = &report.totals;

    let mut summary = TextTable::new(["metric", "value"]).align_right(&[1]);
    summary.push(vec!["records".into(), totals.records.to_string()]);
    summary.push(vec![
        "total_income".into(),
        format_decimal(Some(totals.total_income)),
    ]);
    summary.push(vec![
        "total_expenses".into(),
        format_decimal(Some(totals.total_expenses)),
    ]);
    summary.push(vec!["net_profit".into(), format_decimal(Some(totals.net_profit))]);
    summary.push(vec![
        "status".into(),
        if totals.is_profitable { "profitable" } else { "loss" }.into(),
    ]);
    section(&mut output, "Farm totals", &summary);

    let mut records = TextTable::new(RECORD_COLUMNS.iter().copied())
        .align_right(&[4, 5, 6, 7, 8, 9, 10, 12, 13]);
    for record in &report.records {
        records.push(record_cells(record).into_iter().map(or_missing).collect());
    }
    section(&mut output, "Records", &records);

    section(
        &mut output,
        "Top by profit",
        &ranking_table("profit", &report.top_profit, |r| r.profit),
    );
    section(
        &mut output,
        "Top by expense",
        &ranking_table("total_expenses", &report.top_expense, |r| r.total_expenses),
    );

    let mut alerts =
        TextTable::new(["cow", "feed_stock", "reorder_threshold"]).align_right(&[1, 2]);
    for record in &report.reorder_alerts {
        alerts.push(vec![
            record.label(),
            format_decimal(record.feed_stock),
            or_missing(format_decimal(record.reorder_threshold)),
        ]);
    }
    section(&mut output, "Reorder alerts", &alerts);

    let mut categories = TextTable::new(["category", "records", "income", "expenses", "profit"])
        .align_right(&[1, 2, 3, 4]);
    for group in &report.categories {
        categories.push(vec![
            group.category.clone(),
            group.records.to_string(),
            format_decimal(Some(group.income)),
            format_decimal(Some(group.expenses)),
            format_decimal(Some(group.profit)),
        ]);
    }
    section(&mut output, "Categories", &categories);

    let mut milk = TextTable::new(["session", "liters"]).align_right(&[1]);
    for (name, value) in [
        ("morning", report.milk.morning),
        ("mid_morning", report.milk.mid_morning),
        ("evening", report.milk.evening),
        ("total", report.milk.total),
    ] {
        milk.push(vec![name.into(), format_decimal(Some(value))]);
    }
    section(&mut output, "Milk by session", &milk);

    let mut notices = TextTable::new(["notice"]);
    for notice in &report.notices {
        notices.push(vec![notice.to_string()]);
    }
    section(&mut output, "Notices", &notices);

    output
}

pub fn to_json(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).context("Serializing report to JSON")
}

/// Writes the enriched record table as CSV (`None` or `-` means stdout):
/// every source column as read, followed by the derived metrics.
pub fn write_records_csv(report: &Report, path: Option<&Path>) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path)?;
    let header = report
        .headers
        .iter()
        .map(String::as_str)
        .chain(DERIVED_COLUMNS.iter().copied());
    writer.write_record(header).context("Writing CSV header")?;
    for record in &report.records {
        let source = report.headers.iter().map(|column| {
            record
                .source
                .get(column)
                .map(RawValue::as_display)
                .unwrap_or_default()
        });
        writer
            .write_record(source.chain(derived_cells(record)))
            .with_context(|| format!("Writing record {}", record.source_row))?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}
