pub mod aggregate;
pub mod cli;
pub mod coerce;
pub mod config;
pub mod data;
pub mod derive;
pub mod error;
pub mod io_utils;
pub mod pipeline;
pub mod report;
pub mod resolve;
pub mod source;
pub mod table;

use std::{
    env,
    fs::File,
    io::Write,
    sync::OnceLock,
    thread,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands, OutputFormat, PipelineArgs},
    config::PipelineConfig,
    pipeline::Report,
    table::TextTable,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("herd_ledger", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Report(args) => handle_report(&args),
        Commands::Columns(args) => handle_columns(&args),
        Commands::Watch(args) => handle_watch(&args),
        Commands::InitConfig(args) => handle_init_config(&args),
    }
}

fn load_config(args: &PipelineArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Loading configuration from {path:?}"))?,
        None => PipelineConfig::default(),
    };
    args.apply(&mut config);
    config.validate().context("Validating configuration")?;
    debug!("Effective configuration: {config:?}");
    Ok(config)
}

fn emit(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print!("{}", report::render_text(report)),
        OutputFormat::Json => println!("{}", report::to_json(report)?),
    }
    Ok(())
}

fn handle_report(args: &cli::ReportArgs) -> Result<()> {
    let config = load_config(&args.pipeline)?;
    let source = source::from_config(&args.source.source_config())
        .context("Configuring record source")?;
    info!("Running report over {}", source.describe());
    let report = pipeline::fetch_and_run(source.as_ref(), &config)
        .with_context(|| format!("Fetching records from {}", source.describe()))?;
    emit(&report, args.format)?;
    if let Some(path) = &args.output {
        report::write_records_csv(&report, Some(path))
            .with_context(|| format!("Writing enriched records to {path:?}"))?;
        info!("Enriched table for {} record(s) written to {path:?}", report.records.len());
    }
    Ok(())
}

fn handle_columns(args: &cli::ColumnsArgs) -> Result<()> {
    let pipeline_args = PipelineArgs {
        config: args.config.clone(),
        header_matching: args.header_matching,
        ..PipelineArgs::default()
    };
    let config = load_config(&pipeline_args)?;
    let source = source::from_config(&args.source.source_config())
        .context("Configuring record source")?;
    let records = source
        .fetch()
        .with_context(|| format!("Fetching records from {}", source.describe()))?;
    let columns = pipeline::resolve_for(&records, &config);

    let mut table = TextTable::new(["#", "column", "field"]).align_right(&[0]);
    for (idx, header) in records.headers().iter().enumerate() {
        let field = columns
            .field_for_header(header)
            .map(|f| f.to_string())
            .unwrap_or_default();
        // Quoted so stray interior or trailing whitespace stays visible.
        table.push(vec![(idx + 1).to_string(), format!("'{header}'"), field]);
    }
    print!("{}", table.render());
    for field in columns.unresolved() {
        println!("unresolved: {field}");
    }
    info!(
        "Listed {} column(s); {} field(s) unresolved",
        records.headers().len(),
        columns.unresolved().len()
    );
    Ok(())
}

fn handle_watch(args: &cli::WatchArgs) -> Result<()> {
    let config = load_config(&args.pipeline)?;
    let source = source::from_config(&args.source.source_config())
        .context("Configuring record source")?;
    let interval = Duration::from_secs(args.interval);
    let mut tick = 0usize;
    loop {
        tick += 1;
        match pipeline::fetch_and_run(source.as_ref(), &config) {
            Ok(report) => emit(&report, args.format)?,
            Err(err) => warn!("Refresh {tick} skipped: {err}"),
        }
        if args.iterations.is_some_and(|limit| tick >= limit) {
            break;
        }
        thread::sleep(interval);
    }
    info!("Stopped after {tick} refresh(es)");
    Ok(())
}

fn handle_init_config(args: &cli::InitConfigArgs) -> Result<()> {
    let yaml = PipelineConfig::template_yaml().context("Rendering configuration template")?;
    match &args.output {
        Some(path) => {
            if path.exists() && !args.force {
                bail!("{path:?} already exists; pass --force to overwrite");
            }
            let mut file =
                File::create(path).with_context(|| format!("Creating config file {path:?}"))?;
            file.write_all(yaml.as_bytes())
                .with_context(|| format!("Writing config file {path:?}"))?;
            info!("Configuration template written to {path:?}");
        }
        None => print!("{yaml}"),
    }
    Ok(())
}
