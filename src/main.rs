use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

use readyrs::import::ImportManager;
use readyrs::logging::{init_logging, log_error, LogConfig, LogFormat};
use readyrs::{
    AlertSeverity, BaselineStatus, DailyEvaluation, EngineConfig, InterventionPriority,
    LoadStatus, MetricSample, RecoveryEngine, RecoveryStatus, TrainingCategory,
};

/// ReadyRS - Recovery Scoring CLI
///
/// Scores daily recovery against personal baselines and recommends the
/// day's training intensity.
#[derive(Parser)]
#[command(name = "readyrs")]
#[command(version)]
#[command(about = "Recovery scoring and training recommendation CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format (pretty, json, compact)
    #[arg(long, default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one day and print the recommendation
    Evaluate {
        /// History file (CSV or JSON)
        #[arg(short = 'i', long)]
        history: PathBuf,

        /// Evaluation date (YYYY-MM-DD, default: latest sample)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Athlete ID for CSV files without an athlete column
        #[arg(short, long)]
        athlete: Option<String>,

        #[arg(short = 'f', long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Evaluate several athletes for the same day
    Batch {
        /// One history file per athlete
        #[arg(short = 'i', long = "history", required = true)]
        histories: Vec<PathBuf>,

        /// Evaluation date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        #[arg(short = 'f', long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Evaluate every recorded day in a date range
    Range {
        #[arg(short = 'i', long)]
        history: PathBuf,

        /// First day (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        #[arg(short, long)]
        athlete: Option<String>,
    },

    /// Show the personal baselines as of a date
    Baseline {
        #[arg(short = 'i', long)]
        history: PathBuf,

        #[arg(short, long)]
        date: Option<NaiveDate>,

        #[arg(short, long)]
        athlete: Option<String>,
    },

    /// Manage the engine configuration
    Config {
        /// Write the default configuration to this path
        #[arg(long, value_name = "FILE")]
        init: Option<PathBuf>,

        /// Validate a configuration file
        #[arg(long, value_name = "FILE")]
        check: Option<PathBuf>,
    },
}

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Score")]
    score: u8,
    #[tabled(rename = "Deviation")]
    deviation: String,
    #[tabled(rename = "Weight")]
    weight: String,
}

#[derive(Tabled)]
struct BaselineRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Reference")]
    reference: String,
    #[tabled(rename = "Std")]
    std_dev: String,
    #[tabled(rename = "P10-P90")]
    range: String,
    #[tabled(rename = "Samples")]
    samples: String,
}

#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Athlete")]
    athlete: String,
    #[tabled(rename = "Readiness")]
    readiness: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Recommendation")]
    category: String,
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Alerts")]
    alerts: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig {
        format: cli.log_format,
        ..LogConfig::from_verbosity(cli.verbose)
    };
    init_logging(&log_config)?;

    let config = load_engine_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Evaluate { history, date, athlete, format } => {
            let engine = RecoveryEngine::with_config(config)?;
            let samples = load_history(&history, athlete)?;
            let date = resolve_date(&samples, date)?;

            let evaluation = engine.evaluate(&samples, date).map_err(|e| {
                log_error(&e);
                e
            })?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&evaluation)?),
                OutputFormat::Table => print_evaluation(&evaluation),
            }
        }

        Commands::Batch { histories, date, format } => {
            let engine = RecoveryEngine::with_config(config)?;
            let loaded = histories
                .iter()
                .map(|path| load_history(path, None))
                .collect::<Result<Vec<_>>>()?;

            let results = engine.evaluate_batch(&loaded, date);
            let mut evaluations = Vec::new();
            for (path, result) in histories.iter().zip(results) {
                match result {
                    Ok(evaluation) => evaluations.push(evaluation),
                    Err(e) => {
                        log_error(&e);
                        eprintln!("{} {}: {}", "✗".red(), path.display(), e.user_message());
                    }
                }
            }

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&evaluations)?),
                OutputFormat::Table => print_days(&evaluations),
            }
        }

        Commands::Range { history, from, to, athlete } => {
            let engine = RecoveryEngine::with_config(config)?;
            let samples = load_history(&history, athlete)?;

            let mut evaluations = Vec::new();
            for result in engine.evaluate_range(&samples, from, to) {
                match result {
                    Ok(evaluation) => evaluations.push(evaluation),
                    Err(e) => log_error(&e),
                }
            }
            print_days(&evaluations);
        }

        Commands::Baseline { history, date, athlete } => {
            let engine = RecoveryEngine::with_config(config)?;
            let samples = load_history(&history, athlete)?;
            let date = resolve_date(&samples, date)?;
            let samples = engine.prepare_history(&samples, date)?;

            let estimator = readyrs::BaselineEstimator::with_config(engine.config().baseline.clone());
            let rows: Vec<BaselineRow> = estimator
                .estimate_all(&samples, date)
                .into_iter()
                .map(|(metric, status)| match status {
                    BaselineStatus::Ready(w) => BaselineRow {
                        metric: metric.to_string(),
                        reference: format!("{:.2} {}", w.reference, metric.unit()),
                        std_dev: format!("{:.2}", w.std_dev),
                        range: format!("{:.1}-{:.1}", w.p10, w.p90),
                        samples: format!("{} ({} clipped)", w.sample_count, w.clipped_count),
                    },
                    BaselineStatus::InsufficientData { available, required } => BaselineRow {
                        metric: metric.to_string(),
                        reference: "insufficient data".dimmed().to_string(),
                        std_dev: "-".to_string(),
                        range: "-".to_string(),
                        samples: format!("{}/{}", available, required),
                    },
                })
                .collect();

            println!("{}", format!("Baselines as of {}", date).bold());
            println!("{}", Table::new(rows).with(Style::rounded()));
        }

        Commands::Config { init, check } => {
            if let Some(path) = init {
                EngineConfig::default().save_to_file(&path)?;
                println!("{} {}", "✓ Default configuration written to".green(), path.display());
            } else if let Some(path) = check {
                EngineConfig::load_from_file(&path)?;
                println!("{} {}", "✓ Configuration is valid:".green(), path.display());
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load_from_file(path),
        None if EngineConfig::default_config_path().exists() => Ok(EngineConfig::load_or_default()),
        None => Ok(EngineConfig::default()),
    }
}

fn load_history(path: &Path, athlete: Option<String>) -> Result<Vec<MetricSample>> {
    ImportManager::new(athlete)
        .import_file(path)
        .with_context(|| format!("Failed to load history from {}", path.display()))
}

fn resolve_date(samples: &[MetricSample], date: Option<NaiveDate>) -> Result<NaiveDate> {
    match date {
        Some(date) => Ok(date),
        None => samples
            .iter()
            .map(|s| s.date)
            .max()
            .context("History is empty"),
    }
}

fn colored_status(status: RecoveryStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        RecoveryStatus::Optimal => label.green().bold(),
        RecoveryStatus::Good => label.cyan().bold(),
        RecoveryStatus::Moderate => label.yellow().bold(),
        RecoveryStatus::Poor => label.red().bold(),
    }
}

fn colored_category(category: TrainingCategory) -> ColoredString {
    let label = category.to_string();
    match category {
        TrainingCategory::Hard => label.red().bold(),
        TrainingCategory::Moderate => label.yellow().bold(),
        TrainingCategory::Easy => label.green().bold(),
        TrainingCategory::Rest => label.blue().bold(),
    }
}

fn print_evaluation(evaluation: &DailyEvaluation) {
    let decision = &evaluation.decision;
    println!(
        "{} {} on {}",
        "Recovery report for".bold(),
        evaluation.athlete_id.bold(),
        evaluation.date
    );
    println!(
        "  Readiness: {:.0} ({})",
        evaluation.readiness.score,
        colored_status(evaluation.readiness.status)
    );
    println!(
        "  Recommendation: {} (intensity {:.1}, confidence {:.0}%)",
        colored_category(decision.category),
        decision.intensity,
        decision.confidence * 100.0
    );
    println!("  Reason: {}", decision.reason);

    let rows: Vec<ComponentRow> = evaluation
        .components
        .values()
        .map(|component| ComponentRow {
            metric: component.metric.to_string(),
            score: component.score,
            deviation: component
                .deviation
                .map(|d| format!("{:+.2}", d))
                .unwrap_or_else(|| "-".to_string()),
            weight: evaluation
                .readiness
                .weights
                .get(&component.metric)
                .map(|w| format!("{:.0}%", w * 100.0))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    match &evaluation.training_load {
        LoadStatus::Ready(load) => {
            println!(
                "  Load: ACWR {:.2} ({}), TSB {:.1} ({})",
                load.acwr,
                load.acwr_band.description(),
                load.tsb,
                load.tsb_interpretation.description()
            );
            let ramp = load
                .fitness
                .ctl_ramp_rate
                .map(|r| format!("{:+.1}/week", r))
                .unwrap_or_else(|| "-".to_string());
            let taper = load
                .fitness
                .taper_days
                .map(|d| format!("{} day(s) to fresh", d))
                .unwrap_or_else(|| "fresh form out of reach".to_string());
            println!(
                "  Fitness: CTL {:.1} ramp {}, {} ({})",
                load.ctl,
                ramp,
                load.fitness.race_readiness.description(),
                taper
            );
        }
        LoadStatus::InsufficientData { reason, .. } => {
            println!("  Load: {}", format!("unavailable ({})", reason).dimmed())
        }
    }

    if let Some(debt) = evaluation.trends.sleep_debt_hours {
        println!("  Sleep debt (7d): {:.1} h", debt);
    }

    if !evaluation.alerts.is_empty() {
        println!("{}", "Alerts".bold());
        for alert in &evaluation.alerts {
            let tag = format!("[{}]", alert.severity);
            let tag = match alert.severity {
                AlertSeverity::Yellow => tag.yellow(),
                AlertSeverity::Red => tag.red(),
                AlertSeverity::Critical => tag.red().bold().reversed(),
            };
            println!("  {} {}: {}", tag, alert.category, alert.message);
        }
    }

    if !evaluation.interventions.is_empty() {
        println!("{}", "Interventions".bold());
        for intervention in &evaluation.interventions.interventions {
            let priority = intervention.priority.to_string();
            let priority = match intervention.priority {
                InterventionPriority::High => priority.red(),
                InterventionPriority::Medium => priority.yellow(),
                InterventionPriority::Low => priority.normal(),
            };
            println!("  {} {} ({})", priority, intervention.category, intervention.rationale);
            for action in &intervention.actions {
                println!("      - {}", action);
            }
        }
    }
}

fn print_days(evaluations: &[DailyEvaluation]) {
    let rows: Vec<DayRow> = evaluations
        .iter()
        .map(|e| DayRow {
            date: e.date.to_string(),
            athlete: e.athlete_id.clone(),
            readiness: format!("{:.0}", e.readiness.score),
            status: e.readiness.status.to_string(),
            category: e.decision.category.to_string(),
            rule: e.decision.rule.clone(),
            alerts: e.alerts.len(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}
