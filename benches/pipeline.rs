use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use herd_ledger::config::{PipelineConfig, Pricing};
use herd_ledger::pipeline;
use herd_ledger::source::{CsvSource, RecordSource};
use rust_decimal::Decimal;
use tempfile::TempDir;

const COST_HEADERS: [&str; 11] = [
    "Feed Cost",
    "Labor Cost",
    "Utilities Cost",
    "Salt Cost",
    "Silage Cost",
    "Vaccination Cost",
    "Milking Labor Cost",
    "Electricity Cost",
    "Other Medical Cost",
    "AI Cost",
    "Pregnancy Test Cost",
];

fn generate_herd(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("herd.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(
        file,
        "Cow ID,Category,Date  of Insemination,Morning Milk (L),Mid-Morning Milk (L),Evening Milk (L),{},Feed Stock",
        COST_HEADERS.join(",")
    )
    .expect("header");
    for i in 0..rows {
        let category = match i % 3 {
            0 => "Lactating",
            1 => "Dry",
            _ => "Heifer",
        };
        let month = (i % 12) + 1;
        let day = (i % 28) + 1;
        // Every seventh cow has an unreadable morning reading.
        let morning = if i % 7 == 0 {
            "n/a".to_string()
        } else {
            format!("{}.{}", 5 + i % 9, i % 10)
        };
        let costs = (0..COST_HEADERS.len())
            .map(|c| ((i + c) % 250).to_string())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(
            file,
            "C{i:05},{category},2024-{month:02}-{day:02},{morning},{},{},{costs},\"{},{:03}\"",
            i % 4,
            3 + i % 6,
            i % 3,
            i % 1000
        )
        .expect("row");
    }
    (temp_dir, csv_path)
}

fn bench_config() -> PipelineConfig {
    PipelineConfig {
        pricing: Pricing::uniform(Decimal::new(45, 1)),
        reorder_threshold: Decimal::from(500),
        top_n: 10,
        ..PipelineConfig::default()
    }
}

fn pipeline_benchmark(c: &mut Criterion) {
    let (_dir, csv_path) = generate_herd(20_000);
    let source = CsvSource::new(&csv_path, None, None).expect("csv source");
    let records = source.fetch().expect("fetch herd");
    let config = bench_config();

    let mut group = c.benchmark_group("herd_pipeline");
    group.sample_size(20);
    group.bench_function("fetch_csv", |b| {
        b.iter(|| source.fetch().expect("fetch herd"))
    });
    group.bench_function("derive_and_aggregate", |b| {
        b.iter_batched(
            || records.clone(),
            |records| pipeline::run(&records, &config),
            BatchSize::LargeInput,
        )
    });
    group.bench_function("fetch_and_run", |b| {
        b.iter(|| pipeline::fetch_and_run(&source, &config).expect("report"))
    });
    group.finish();
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
