//! RFID Signals CLI
//!
//! Batch conversion of daily RFID feed files into room signal vectors.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use rfid_signals::{
    audit::{BatchReport, RunSummary},
    config::Config,
    core::{DayPipeline, SignalRecord},
    export::{self, ExportFormat, MemorySink, SignalSink},
    ingest::{day_file_path, RoomCode, SensorTable},
    visits::{VisitIndex, VisitLookup},
    VERSION,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "rfid-signals")]
#[command(version = VERSION)]
#[command(about = "Room signal vectors from clinic RFID ping feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the day files in a date range
    Process {
        /// First day, YYYY-MM-DD
        #[arg(long)]
        from: NaiveDate,

        /// Last day, inclusive
        #[arg(long)]
        to: NaiveDate,

        /// Directory holding the day files
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Directory for signal files and reports
        #[arg(long, short)]
        output_dir: Option<PathBuf>,

        /// CSV of scheduled visits for patient enrichment
        #[arg(long)]
        visits: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum)]
        format: Option<ExportFormat>,

        /// Days read and aggregated concurrently
        #[arg(long, default_value = "1")]
        jobs: usize,
    },

    /// List rooms and their sensors
    Rooms,

    /// Show saved batch reports
    Report {
        /// Only this day
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Process {
            from,
            to,
            data_dir,
            output_dir,
            visits,
            format,
            jobs,
        } => {
            let mut config = config;
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if visits.is_some() {
                config.visits_file = visits;
            }
            if let Some(format) = format {
                config.export.format = format;
            }
            cmd_process(&config, from, to, jobs)
        }
        Commands::Rooms => cmd_rooms(&config),
        Commands::Report { date } => cmd_report(&config, date),
        Commands::Config => cmd_config(&config),
    }
}

fn cmd_process(config: &Config, from: NaiveDate, to: NaiveDate, jobs: usize) -> Result<()> {
    if from > to {
        bail!("--from {from} is after --to {to}");
    }
    config.ensure_directories().with_context(|| {
        format!("Could not create output directory {:?}", config.output_dir)
    })?;

    let sensors = config
        .load_sensor_table()
        .context("Failed to load sensor table")?;
    warn_suspicious(&sensors);

    let visits: Option<VisitIndex> = config.load_visits().context("Failed to load visits")?;
    if let Some(index) = &visits {
        info!(visits = index.len(), "Loaded visit records");
    }
    let lookup: Option<&dyn VisitLookup> = visits.as_ref().map(|v| v as &dyn VisitLookup);

    let dates: Vec<NaiveDate> = from.iter_days().take_while(|d| *d <= to).collect();
    let jobs = jobs.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to start worker pool")?;

    let mut sink = export::open_sink(
        &config.output_dir,
        config.export.format,
        config.export.signal_multiplier,
    )
    .context("Failed to open output files")?;

    let run_id = Uuid::new_v4();
    let mut summary = RunSummary::new(run_id);
    info!(%run_id, days = dates.len(), jobs, "Starting run");

    // Each day is aggregated into memory on its own pipeline, then written in
    // date order so output does not depend on `jobs`.
    for chunk in dates.chunks(jobs) {
        let results: Vec<rfid_signals::Result<DayOutput>> = pool.install(|| {
            chunk
                .par_iter()
                .map(|&date| {
                    let mut pipeline =
                        DayPipeline::new(&sensors, config.hours, config.aggregation);
                    if let Some(lookup) = lookup {
                        pipeline = pipeline.with_visits(lookup);
                    }
                    let path = day_file_path(&config.data_dir, date, &config.file_suffix);
                    let mut day_sink = MemorySink::default();
                    let report = pipeline.run_day(&path, date, run_id, &mut day_sink)?;
                    Ok(DayOutput {
                        date,
                        report,
                        records: day_sink.records,
                    })
                })
                .collect()
        });

        for result in results {
            let day = result?;
            let Some(report) = day.report else {
                summary.record_missing_day();
                continue;
            };
            for record in &day.records {
                sink.emit(record)
                    .with_context(|| format!("Failed to write signals for {}", day.date))?;
            }
            if !report.counters.is_balanced() {
                warn!(date = %day.date, "Validation counters do not balance");
            }
            let path = report
                .save(&config.reports_dir())
                .with_context(|| format!("Failed to save report for {}", day.date))?;
            info!(
                date = %day.date,
                windows = report.windows_emitted,
                report = %path.display(),
                "Day complete"
            );
            summary.record_day(&report);
        }
    }
    sink.finish().context("Failed to close output files")?;

    println!("{}", summary.summary());
    println!(
        "Output written to {:?} ({})",
        config.output_dir,
        config.export.format.extension()
    );
    Ok(())
}

struct DayOutput {
    date: NaiveDate,
    report: Option<BatchReport>,
    records: Vec<SignalRecord>,
}

fn warn_suspicious(sensors: &SensorTable) {
    for (sensor, room) in sensors.suspicious_entries() {
        warn!(
            sensor,
            room = %room,
            "Sensor id is not an IPv4 address; feed rows will not match it"
        );
    }
}

fn cmd_rooms(config: &Config) -> Result<()> {
    let sensors = config
        .load_sensor_table()
        .context("Failed to load sensor table")?;
    let suspicious: Vec<&str> = sensors
        .suspicious_entries()
        .into_iter()
        .map(|(sensor, _)| sensor)
        .collect();

    println!("Rooms");
    println!("=====");
    println!();
    for room in RoomCode::ALL {
        let ids: Vec<String> = sensors
            .sensors_for(room)
            .into_iter()
            .map(|s| {
                if suspicious.contains(&s) {
                    format!("{s} (suspicious)")
                } else {
                    s.to_string()
                }
            })
            .collect();
        let ids = if ids.is_empty() {
            "-".to_string()
        } else {
            ids.join(", ")
        };
        println!("{:>2}  {:<12} {}", room.ordinal(), room.name(), ids);
    }
    Ok(())
}

fn cmd_report(config: &Config, date: Option<NaiveDate>) -> Result<()> {
    let dir = config.reports_dir();
    let reports: Vec<BatchReport> = BatchReport::load_dir(&dir)
        .with_context(|| format!("Failed to read reports in {dir:?}"))?
        .into_iter()
        .filter(|r| date.map_or(true, |d| r.date == d))
        .collect();

    if reports.is_empty() {
        println!("No batch reports found in {dir:?}");
        println!("Run 'rfid-signals process' to generate some.");
        return Ok(());
    }
    for report in &reports {
        println!("{}", report.summary());
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
