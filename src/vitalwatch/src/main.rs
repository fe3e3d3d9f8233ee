#[macro_use]
extern crate log;

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, anyhow};
use chrono::{DurationRound, Local, NaiveDateTime, TimeDelta};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tokio::sync::watch;
use vitalwatch::{AnalysisArgs, CsvExporter, Watcher};
use vitalwatch_algos::{HealthMonitor, HealthReport};
use vitalwatch_types::{HealthSeries, Metric};

#[derive(Parser)]
pub struct VitalWatchCli {
    /// First timestamp of a generated series, defaults to `--days` before now
    #[arg(env = "VITALWATCH_START", long, global = true)]
    pub start: Option<NaiveDateTime>,
    #[clap(flatten)]
    pub analysis: AnalysisArgs,
    #[clap(subcommand)]
    pub subcommand: VitalWatchCommand,
}

#[derive(Subcommand)]
pub enum VitalWatchCommand {
    ///
    /// Generate a synthetic series and write it as CSV
    ///
    Generate {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    ///
    /// Print the summary, status counts, anomalies and insights of a series
    ///
    Analyze {
        /// CSV written by `generate`, a fresh series is generated otherwise
        #[arg(long, short)]
        input: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    ///
    /// Write the scored and flagged table as CSV
    ///
    Export {
        #[arg(long, short)]
        input: Option<PathBuf>,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    ///
    /// Keep extending a generated series and re-analyze it until Ctrl-C
    ///
    Watch {
        /// Seconds between two polls
        #[arg(long, env = "VITALWATCH_POLL", default_value_t = 5)]
        poll: u64,
        /// Readings appended per poll
        #[arg(long, default_value_t = 1)]
        batch: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(error) = dotenv() {
        println!("{}", error);
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = VitalWatchCli::parse();
    let monitor = HealthMonitor::new(cli.analysis.resolve()?)?;
    let start = match cli.start {
        Some(start) => start,
        None => default_start(&monitor)?,
    };

    match cli.subcommand {
        VitalWatchCommand::Generate { output } => {
            let series = monitor.generate(start)?;
            info!(
                "generated {} readings, {} with injected anomalies",
                series.len(),
                series.iter().filter(|r| r.is_injected_anomaly).count()
            );
            CsvExporter::write_series(create_output(output)?, &series)
        }
        VitalWatchCommand::Analyze { input, json } => {
            let series = load_series(&monitor, input, start)?;
            let report = monitor.analyze(&series)?;

            if json {
                serde_json::to_writer_pretty(io::stdout().lock(), &report)?;
                println!();
            } else {
                print_report(&series, &report);
            }
            Ok(())
        }
        VitalWatchCommand::Export { input, output } => {
            let series = load_series(&monitor, input, start)?;
            let report = monitor.analyze(&series)?;
            CsvExporter::write(create_output(output)?, &report.rows(&series))
        }
        VitalWatchCommand::Watch { poll, batch } => {
            let watcher = Watcher::new(&monitor, start, batch)?;
            let (stop_tx, stop_rx) = watch::channel(false);
            ctrlc::set_handler(move || {
                let _ = stop_tx.send(true);
            })?;

            watcher
                .run(Duration::from_secs(poll), stop_rx, |update| {
                    println!(
                        "{}: {:.1} ({})",
                        update.latest.timestamp, update.score.overall_score, update.score.status
                    );
                    for insight in &update.insights {
                        println!("\t[{}] {}", insight.severity, insight.message);
                    }
                })
                .await?;
            Ok(())
        }
    }
}

/// Start far enough back that the series ends at the current hour.
fn default_start(monitor: &HealthMonitor) -> anyhow::Result<NaiveDateTime> {
    let now = Local::now().naive_local();
    let now = now.duration_trunc(TimeDelta::hours(1)).unwrap_or(now);
    let span = TimeDelta::try_days(monitor.config().num_days)
        .ok_or_else(|| anyhow!("day count out of range"))?;
    Ok(now - span)
}

fn load_series(
    monitor: &HealthMonitor,
    input: Option<PathBuf>,
    start: NaiveDateTime,
) -> anyhow::Result<HealthSeries> {
    match input {
        Some(path) => {
            let file =
                File::open(&path).with_context(|| format!("opening `{}`", path.display()))?;
            let series = CsvExporter::read_series(BufReader::new(file))
                .with_context(|| format!("reading `{}`", path.display()))?;
            info!("loaded {} readings from {}", series.len(), path.display());
            Ok(series)
        }
        None => Ok(monitor.generate(start)?),
    }
}

fn create_output(output: Option<PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(&path).with_context(|| format!("creating `{}`", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    })
}

fn print_report(series: &HealthSeries, report: &HealthReport) {
    println!("{}", report.summary);

    let counts = report.status_counts();
    println!(
        "\nStatus: {} excellent, {} good, {} needs attention",
        counts.excellent, counts.good, counts.needs_attention
    );

    let flagged = series
        .iter()
        .zip(&report.anomalies)
        .filter(|(_, anomaly)| anomaly.is_anomaly)
        .collect::<Vec<_>>();
    println!("\nAnomalies ({}):", flagged.len());
    for (record, anomaly) in flagged {
        let strongest = anomaly
            .strongest_metric()
            .map(Metric::label)
            .unwrap_or("combination");
        println!(
            "\t{}: score {:.3}, {}",
            record.timestamp, anomaly.anomaly_score, strongest
        );
    }

    println!("\nInsights:");
    for insight in &report.insights {
        println!("\t[{}] {}", insight.severity, insight.message);
    }
}
