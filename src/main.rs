use clap::Parser;
use netavail_service::config::{load_config, EngineConfig};
use netavail_service::consolidate::{run_period, Consolidation};
use netavail_service::ingest::tabular::{self, Parsed};
use netavail_service::logging::{self, LogLevel, Stage};
use netavail_service::model::RowRejection;
use serde::Serialize;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "netavail",
    about = "Consolidates station availability and advances incident state for one reporting period."
)]
struct Args {
    /// Current-period metric export (CSV).
    #[arg(long)]
    metrics: PathBuf,
    /// Frequency reference table (CSV).
    #[arg(long)]
    frequencies: PathBuf,
    /// Incident snapshot written by the previous run (CSV).
    #[arg(long)]
    previous: Option<PathBuf>,
    /// As-of date for elapsed-day computation, in the configured date format or ISO.
    #[arg(long)]
    reference_date: String,
    /// Overrides `calculation.period_days`.
    #[arg(long)]
    period_days: Option<u32>,
    #[arg(long, env = "NETAVAIL_CONFIG")]
    config: Option<PathBuf>,
    /// Report destination; stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Where to write the next incident snapshot.
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
    #[arg(long, env = "NETAVAIL_LOG_FILE")]
    log_file: Option<String>,
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

#[derive(Serialize)]
struct RunReport<'a> {
    #[serde(flatten)]
    consolidation: &'a Consolidation,
    rejected_rows: Vec<RowRejection>,
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let level = if args.verbose { LogLevel::Debug } else { LogLevel::Info };
    logging::init_logger(level, args.log_file.as_deref(), args.verbose);

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    if let Some(days) = args.period_days {
        config.calculation.period_days = days;
        config.validate()?;
    }

    let reference_date =
        tabular::parse_date(&args.reference_date, &config.calculation.date_format)
            .ok_or_else(|| format!("invalid reference date '{}'", args.reference_date))?;
    logging::info(
        Stage::System,
        None,
        &format!(
            "Consolidating period of {} days ending {}",
            config.calculation.period_days, reference_date
        ),
    );

    let metrics = tabular::load_metrics(&args.metrics)?;
    let frequencies = tabular::load_frequencies(&args.frequencies)?;
    let previous = match &args.previous {
        Some(path) => tabular::load_snapshot(path, &config)?,
        None => {
            logging::warn(
                Stage::Ingest,
                None,
                "no previous snapshot given; every station starts without history",
            );
            Parsed {
                records: Vec::new(),
                rejections: Vec::new(),
            }
        }
    };

    let mut rejected_rows = Vec::new();
    rejected_rows.extend(metrics.rejections);
    rejected_rows.extend(frequencies.rejections);
    rejected_rows.extend(previous.rejections);
    logging::log_rejections(&rejected_rows);

    let consolidation = run_period(
        &metrics.records,
        frequencies.records,
        &previous.records,
        reference_date,
        &config,
    );

    let report = RunReport {
        consolidation: &consolidation,
        rejected_rows,
    };
    match &args.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, &report)?;
            writer.flush()?;
            logging::info(Stage::System, None, &format!("Report written to {}", path.display()));
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &report)?;
            writeln!(writer)?;
        }
    }

    if let Some(path) = &args.snapshot_out {
        tabular::save_snapshot(path, &consolidation.snapshot, &config)?;
        logging::info(
            Stage::System,
            None,
            &format!(
                "Next snapshot ({} stations) written to {}",
                consolidation.snapshot.len(),
                path.display()
            ),
        );
    }

    Ok(())
}
