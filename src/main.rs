//! CLI entry point for the class scores pipeline.
//!
//! Provides subcommands for watching the class sheets on a timer, dumping a
//! single merged snapshot, and logging population metrics.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use class_scores::{
    config::PipelineConfig,
    fetch::BasicClient,
    metrics::{
        OverallMetrics, Scope, StatusMatching, mark_breakdowns, performance_feedback, select,
        subject_distribution, subject_overview, subject_percentages, top_n,
    },
    output::{print_pretty, to_json, write_csv},
    pipeline::run_cycle,
    record::{MergedDataset, Subject},
    scheduler::{Phase, RefreshScheduler},
};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "class_scores")]
#[command(about = "Merge class score sheets and report student performance", long_about = None)]
struct Cli {
    /// JSON pipeline config (falls back to CLASS_SCORES_CONFIG, then built-in sources)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh on a timer and log metrics for every new snapshot
    Watch {
        /// Refresh interval in seconds (overrides the config)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Run one cycle and write the merged dataset to stdout
    Snapshot {
        #[arg(short, long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },
    /// Run one cycle and log metrics, distributions and leaderboards
    Metrics {
        /// Leaderboard size
        #[arg(short = 'n', long, default_value_t = 15)]
        top: usize,

        /// Restrict to one student
        #[arg(long)]
        usn: Option<String>,

        /// Also log an overview for one subject (java, python, ml)
        #[arg(long)]
        subject: Option<Subject>,

        /// Compare overall statuses case-insensitively
        #[arg(long, default_value_t = false)]
        case_insensitive: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/class_scores.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("class_scores.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config)?;
    let client = BasicClient::with_timeout(Duration::from_secs(30))?;

    match cli.command {
        Commands::Watch { interval } => {
            if let Some(secs) = interval {
                config.refresh_interval_secs = secs;
                config.validate()?;
            }
            watch(client, config).await?;
        }
        Commands::Snapshot { format } => {
            let dataset = run_cycle(&client, &config.sources).await?;
            print_pretty(&dataset);
            match format {
                Format::Csv => write_csv(std::io::stdout().lock(), &dataset)?,
                Format::Json => println!("{}", to_json(&dataset)?),
            }
        }
        Commands::Metrics {
            top,
            usn,
            subject,
            case_insensitive,
        } => {
            let matching = if case_insensitive {
                StatusMatching::CaseInsensitive
            } else {
                config.status_matching
            };
            let dataset = run_cycle(&client, &config.sources).await?;
            report(&dataset, matching, top, usn.as_deref(), subject);
        }
    }

    Ok(())
}

/// Resolves the config from `--config`, then `CLASS_SCORES_CONFIG`, then
/// the built-in defaults.
fn load_config(path: Option<String>) -> Result<PipelineConfig> {
    match path.or_else(|| std::env::var("CLASS_SCORES_CONFIG").ok()) {
        Some(path) => {
            let config = PipelineConfig::load(&path)?;
            info!(path = %path, sources = config.sources.len(), "Config loaded");
            Ok(config)
        }
        None => {
            info!("No config file given, using built-in sources");
            Ok(PipelineConfig::default())
        }
    }
}

/// Runs the scheduler until Ctrl+C, logging metrics whenever a new snapshot
/// lands and a warning whenever a cycle fails.
#[tracing::instrument(skip_all, fields(period_secs = config.refresh_interval_secs))]
async fn watch(client: BasicClient, config: PipelineConfig) -> Result<()> {
    let scheduler =
        RefreshScheduler::new(client, config.sources.clone(), config.refresh_interval())?;
    let mut rx = scheduler.subscribe();
    let handle = scheduler.start();
    info!("Watching sources. Press Ctrl+C to stop.");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last_cycle = 0;

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.context("failed to listen for Ctrl+C")?;
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                if state.phase != Phase::Idle {
                    continue;
                }
                if let Some(snapshot) = state.snapshot_since(last_cycle) {
                    last_cycle = snapshot.cycle;
                    let metrics =
                        OverallMetrics::compute(snapshot.dataset.records(), config.status_matching);
                    info!(
                        cycle = snapshot.cycle,
                        refreshed_at = %snapshot.refreshed_at,
                        total_students = metrics.total_students,
                        good = metrics.total_good,
                        average = metrics.total_average,
                        poor = metrics.total_poor,
                        "Overall metrics"
                    );
                }
                if let Some(err) = &state.last_error {
                    warn!(
                        error = %err,
                        has_snapshot = state.snapshot.is_some(),
                        "Refresh failed, serving previous snapshot"
                    );
                }
            }
        }
    }

    handle.stop().await;
    info!("Stopped watching");
    Ok(())
}

fn report(
    dataset: &MergedDataset,
    matching: StatusMatching,
    top: usize,
    usn: Option<&str>,
    subject: Option<Subject>,
) {
    let scope = usn.map_or(Scope::All, Scope::Student);
    let scoped = select(dataset.records(), scope);

    if scoped.is_empty() {
        warn!(usn, "No records match");
        return;
    }

    let metrics = OverallMetrics::compute(scoped.iter().copied(), matching);
    info!(
        total_students = metrics.total_students,
        good = metrics.total_good,
        average = metrics.total_average,
        poor = metrics.total_poor,
        matching = ?matching,
        "Overall metrics"
    );

    for dist in subject_distribution(scoped.iter().copied()) {
        info!(
            subject = %dist.subject,
            good = dist.good,
            average = dist.average,
            poor = dist.poor,
            "Subject distribution"
        );
    }

    for (rank, record) in top_n(scoped.iter().copied(), top).into_iter().enumerate() {
        info!(
            rank = rank + 1,
            usn = record.usn.as_deref().unwrap_or("-"),
            name = record.first_name.as_deref().unwrap_or("-"),
            class = %record.class_name,
            total = %record.total_mark,
            "Leaderboard"
        );
    }

    if usn.is_some() {
        for record in &scoped {
            info!(
                usn = record.usn.as_deref().unwrap_or("-"),
                feedback = performance_feedback(record.overall_status.as_deref()),
                "Student feedback"
            );
            for share in subject_percentages(record) {
                info!(subject = %share.subject, percent = share.percent, "Subject share");
            }
        }
        for breakdown in mark_breakdowns(dataset.records(), usn) {
            info!(
                name = %breakdown.name,
                java = breakdown.java,
                python = breakdown.python,
                machine_learning = breakdown.machine_learning,
                total = breakdown.total,
                "Mark breakdown"
            );
        }
    }

    if let Some(subject) = subject {
        let overview = subject_overview(dataset.records(), subject);
        info!(
            subject = %overview.subject,
            total = overview.total,
            good = overview.good,
            average = overview.average,
            poor = overview.poor,
            "Subject overview"
        );
        for (rank, record) in overview.top.iter().enumerate() {
            info!(
                rank = rank + 1,
                usn = record.usn.as_deref().unwrap_or("-"),
                mark = %subject.mark(record),
                "Subject leaderboard"
            );
        }
    }
}
