mod common;

use chrono::NaiveDate;
use herd_ledger::{
    config::{DerivationMode, PipelineConfig, Pricing},
    data::{Record, RecordSet},
    error::Notice,
    pipeline,
    resolve::{HeaderMatching, LogicalField},
    source::{CsvSource, JsonSource, RecordSource},
};
use proptest::prelude::*;
use rust_decimal::Decimal;

use common::{Scratch, dec, fixture_config, fixture_path};

fn fixture_records() -> RecordSet {
    CsvSource::new(&fixture_path("herd_snapshot.csv"), None, None)
        .expect("csv source")
        .fetch()
        .expect("fetch fixture")
}

fn ids(records: &[herd_ledger::derive::DerivedRecord]) -> Vec<String> {
    records.iter().map(|r| r.label()).collect()
}

#[test]
fn fixture_report_matches_hand_computed_metrics() {
    let report = pipeline::run(&fixture_records(), &fixture_config());

    let income = report.records.iter().map(|r| r.income).collect::<Vec<_>>();
    assert_eq!(
        income,
        [Some(dec("94")), Some(dec("96")), Some(dec("0")), Some(dec("18"))]
    );
    let expenses = report
        .records
        .iter()
        .map(|r| r.total_expenses)
        .collect::<Vec<_>>();
    assert_eq!(
        expenses,
        [
            Some(dec("1900")),
            Some(dec("1575")),
            Some(dec("785")),
            Some(dec("485"))
        ]
    );
    assert_eq!(report.records[3].total_milk, Some(dec("5")));

    assert_eq!(report.totals.total_income, dec("208"));
    assert_eq!(report.totals.total_expenses, dec("4745"));
    assert_eq!(report.totals.net_profit, dec("-4537"));
    assert!(!report.totals.is_profitable);

    assert_eq!(ids(&report.top_profit), ["C004", "C003", "C002"]);
    assert_eq!(ids(&report.top_expense), ["C001", "C002", "C003"]);
    assert_eq!(ids(&report.reorder_alerts), ["C002"]);
}

#[test]
fn fixture_birth_dates_use_double_spaced_header() {
    let report = pipeline::run(&fixture_records(), &fixture_config());
    assert_eq!(
        report.columns.get(&LogicalField::InseminationDate).map(String::as_str),
        Some("Date  of Insemination")
    );
    let births = report
        .records
        .iter()
        .map(|r| r.expected_birth_date)
        .collect::<Vec<_>>();
    assert_eq!(
        births,
        [
            NaiveDate::from_ymd_opt(2024, 10, 10),
            None,
            NaiveDate::from_ymd_opt(2024, 12, 23),
            None
        ]
    );
}

#[test]
fn fixture_notices_cover_unresolved_and_unparseable() {
    let report = pipeline::run(&fixture_records(), &fixture_config());
    assert!(report.notices.contains(&Notice::UnresolvedField {
        field: LogicalField::Valuation
    }));
    assert!(report.notices.contains(&Notice::UnparseableValue {
        row: 4,
        column: "Morning Milk (L)".into(),
        raw: "abc".into(),
    }));
    assert!(report.notices.contains(&Notice::UnparseableValue {
        row: 4,
        column: "Date  of Insemination".into(),
        raw: "not recorded".into(),
    }));
    assert_eq!(report.unparseable_count(), 2);
    assert_eq!(report.notices.len(), 3);
}

#[test]
fn strict_mode_drops_incomplete_income() {
    let config = PipelineConfig {
        mode: DerivationMode::Strict,
        ..fixture_config()
    };
    let report = pipeline::run(&fixture_records(), &config);
    let income = report.records.iter().map(|r| r.income).collect::<Vec<_>>();
    assert_eq!(income, [Some(dec("94")), None, None, None]);
    assert_eq!(report.records[1].total_expenses, Some(dec("1575")));
    assert_eq!(report.records[1].profit, None);
    assert_eq!(ids(&report.top_profit), ["C001"]);
    assert_eq!(report.totals.total_income, dec("94"));
}

#[test]
fn profit_identity_holds_for_every_record() {
    let report = pipeline::run(&fixture_records(), &fixture_config());
    for record in &report.records {
        if let (Some(income), Some(expenses)) = (record.income, record.total_expenses) {
            assert_eq!(record.profit, Some(income - expenses));
        } else {
            assert_eq!(record.profit, None);
        }
    }
}

#[test]
fn record_thresholds_are_opt_in() {
    let config = PipelineConfig {
        use_record_thresholds: true,
        reorder_threshold: dec("10"),
        ..fixture_config()
    };
    let report = pipeline::run(&fixture_records(), &config);
    // C001 carries its own 200 kg level (1500 in stock); C002 falls back to 10.
    assert!(report.reorder_alerts.is_empty());

    let config = PipelineConfig {
        reorder_threshold: dec("1500"),
        use_record_thresholds: true,
        ..fixture_config()
    };
    let report = pipeline::run(&fixture_records(), &config);
    assert_eq!(ids(&report.reorder_alerts), ["C002", "C003"]);
}

#[test]
fn scenario_two_sessions_without_expense_columns() {
    let records = RecordSet::from_records(vec![
        Record::new()
            .with("id", "1")
            .with("milk_am", "10")
            .with("milk_pm", "8"),
    ]);
    let pricing = Pricing {
        morning: dec("5"),
        mid_morning: Decimal::ZERO,
        evening: dec("4"),
    };

    let lenient = PipelineConfig {
        pricing,
        ..PipelineConfig::default()
    };
    let report = pipeline::run(&records, &lenient);
    assert_eq!(report.records[0].income, Some(dec("82")));
    assert_eq!(report.records[0].total_expenses, Some(Decimal::ZERO));
    assert_eq!(report.records[0].profit, Some(dec("82")));

    let strict = PipelineConfig {
        pricing,
        mode: DerivationMode::Strict,
        ..PipelineConfig::default()
    };
    let report = pipeline::run(&records, &strict);
    assert_eq!(report.records[0].total_expenses, None);
    assert_eq!(report.records[0].profit, None);
}

#[test]
fn scenario_reorder_boundary_and_separators() {
    let records = RecordSet::from_records(vec![
        Record::new().with("id", "a").with("Feed Stock", "50"),
        Record::new().with("id", "b").with("Feed Stock", "50.01"),
        Record::new().with("id", "c").with("Feed Stock", "1,200"),
        Record::new().with("id", "d").with("Feed Stock", ""),
    ]);
    let config = PipelineConfig {
        reorder_threshold: dec("50"),
        ..PipelineConfig::default()
    };
    let report = pipeline::run(&records, &config);
    assert_eq!(report.records[2].feed_stock, Some(dec("1200")));
    assert_eq!(report.records[3].feed_stock, None);
    assert_eq!(ids(&report.reorder_alerts), ["a"]);
}

#[test]
fn break_even_counts_as_profitable() {
    let config = PipelineConfig {
        pricing: Pricing::uniform(dec("2.5")),
        ..PipelineConfig::default()
    };
    let records = RecordSet::from_records(vec![
        Record::new().with("milk_am", "12").with("Feed Cost", "25"),
        Record::new().with("milk_pm", "8").with("Labor Cost", "25"),
    ]);
    let report = pipeline::run(&records, &config);
    assert_eq!(report.totals.total_income, dec("50"));
    assert_eq!(report.totals.net_profit, Decimal::ZERO);
    assert!(report.totals.is_profitable);

    let records = RecordSet::from_records(vec![
        Record::new().with("milk_am", "19.996").with("Feed Cost", "50"),
    ]);
    let report = pipeline::run(&records, &config);
    assert_eq!(report.totals.total_income, dec("49.99"));
    assert!(!report.totals.is_profitable);
}

#[test]
fn collapse_whitespace_matches_irregular_headers() {
    let records = RecordSet::from_records(vec![
        Record::new().with("  Evening   Milk (L)", "10"),
    ]);
    let exact = PipelineConfig {
        pricing: Pricing::uniform(dec("2")),
        ..PipelineConfig::default()
    };
    assert_eq!(pipeline::run(&records, &exact).records[0].income, None);

    let collapsed = PipelineConfig {
        header_matching: HeaderMatching::CollapseWhitespace,
        ..exact
    };
    assert_eq!(
        pipeline::run(&records, &collapsed).records[0].income,
        Some(dec("20"))
    );
}

#[test]
fn json_source_feeds_the_same_pipeline() {
    let records = JsonSource::new(&fixture_path("herd_snapshot.json"))
        .fetch()
        .expect("json fetch");
    let config = PipelineConfig {
        pricing: Pricing {
            morning: dec("5"),
            mid_morning: Decimal::ZERO,
            evening: dec("4"),
        },
        reorder_threshold: dec("50"),
        ..PipelineConfig::default()
    };
    let report = pipeline::run(&records, &config);
    let income = report.records.iter().map(|r| r.income).collect::<Vec<_>>();
    assert_eq!(income, [Some(dec("82")), Some(dec("30")), Some(dec("16"))]);
    assert_eq!(ids(&report.reorder_alerts), ["2"]);
    assert_eq!(report.records[0].feed_stock, Some(dec("1200")));
}

#[test]
fn ragged_and_blank_csv_rows_are_tolerated() {
    let scratch = Scratch::new();
    let path = scratch.write(
        "ragged.csv",
        "Cow ID,Morning Milk (L),Feed Cost\nA,10,5\n,,\nB,4\n",
    );
    let records = CsvSource::new(&path, None, None)
        .expect("source")
        .fetch()
        .expect("fetch");
    assert_eq!(records.len(), 2);
    let config = PipelineConfig {
        pricing: Pricing::uniform(dec("1")),
        ..PipelineConfig::default()
    };
    let report = pipeline::run(&records, &config);
    assert_eq!(report.records[1].income, Some(dec("4")));
    assert_eq!(report.records[1].total_expenses, Some(Decimal::ZERO));
}

#[test]
fn notices_quote_sheet_rows_across_spacer_lines() {
    let scratch = Scratch::new();
    let path = scratch.write(
        "spaced.csv",
        "Cow ID,Morning Milk (L)\nA,10\n\n,\nB,lots\n",
    );
    let records = CsvSource::new(&path, None, None)
        .expect("source")
        .fetch()
        .expect("fetch");
    let report = pipeline::run(&records, &PipelineConfig::default());
    assert_eq!(report.records[1].source_row, 4);
    assert!(report.notices.contains(&Notice::UnparseableValue {
        row: 4,
        column: "Morning Milk (L)".into(),
        raw: "lots".into(),
    }));
}

#[test]
fn failed_fetch_produces_no_report() {
    let source = CsvSource::new(&fixture_path("missing.csv"), None, None).expect("source");
    assert!(pipeline::fetch_and_run(&source, &PipelineConfig::default()).is_err());
}

const FIVE_E28: &str = "50000000000000000000000000000";

#[test]
fn out_of_range_sums_become_notices() {
    let max = Decimal::MAX.to_string();
    let records = RecordSet::from_records(vec![
        Record::new().with("Cow ID", "A").with("milk_am", max.as_str()),
        Record::new()
            .with("Cow ID", "B")
            .with("Feed Cost", FIVE_E28)
            .with("Labor Cost", FIVE_E28),
        Record::new().with("Cow ID", "C").with("Feed Cost", FIVE_E28),
        Record::new().with("Cow ID", "D").with("Feed Cost", FIVE_E28),
    ]);
    let config = PipelineConfig {
        pricing: Pricing::uniform(dec("2")),
        ..PipelineConfig::default()
    };
    let report = pipeline::run(&records, &config);

    assert_eq!(report.records[0].total_milk, Some(Decimal::MAX));
    assert_eq!(report.records[0].income, None);
    assert_eq!(report.records[0].profit, None);
    assert_eq!(report.records[1].total_expenses, None);
    assert_eq!(report.records[2].profit, Some(-dec(FIVE_E28)));
    assert!(report.notices.contains(&Notice::MetricOverflow {
        row: 1,
        metric: "income".into(),
    }));
    assert!(report.notices.contains(&Notice::MetricOverflow {
        row: 2,
        metric: "total_expenses".into(),
    }));

    assert_eq!(report.totals.overflowed, 1);
    assert_eq!(report.totals.total_expenses, dec(FIVE_E28));
    assert!(report.notices.contains(&Notice::TotalOverflow {
        aggregate: "farm totals".into(),
        skipped: 1,
    }));
    assert_eq!(ids(&report.top_expense), ["C", "D", "A"]);
}

fn extreme_number() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(Decimal::MAX.to_string()),
        Just(Decimal::MIN.to_string()),
        "-?[0-9]{1,35}(\\.[0-9]{1,12})?",
        "[1-9][0-9]{0,2}(,[0-9]{3}){1,10}",
    ]
}

proptest! {
    #[test]
    fn extreme_inputs_never_abort_the_run(
        morning in extreme_number(),
        evening in any::<f64>(),
        feed in extreme_number(),
        labor in any::<f64>(),
        stock in extreme_number(),
        price in extreme_number(),
        strict in any::<bool>(),
    ) {
        let records = RecordSet::from_records(vec![
            Record::new()
                .with("Cow ID", "A")
                .with("milk_am", morning.as_str())
                .with("milk_pm", evening)
                .with("Feed Cost", feed.as_str())
                .with("Labor Cost", labor)
                .with("Feed Stock", stock.as_str()),
            Record::new()
                .with("Cow ID", "B")
                .with("milk_am", Decimal::MAX.to_string().as_str())
                .with("Feed Cost", feed.as_str()),
        ]);
        let config = PipelineConfig {
            pricing: Pricing::uniform(price.parse().unwrap_or(Decimal::MAX)),
            mode: if strict { DerivationMode::Strict } else { DerivationMode::Lenient },
            reorder_threshold: dec("50"),
            ..PipelineConfig::default()
        };
        let report = pipeline::run(&records, &config);

        prop_assert_eq!(report.records.len(), 2);
        for record in &report.records {
            if let Some(profit) = record.profit {
                let income = record.income.unwrap_or_default();
                let expenses = record.total_expenses.unwrap_or_default();
                prop_assert_eq!(income.checked_sub(expenses), Some(profit));
            }
        }
    }
}
