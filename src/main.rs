use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use cargo_schedule_watch::acquire::{IncheonCargoSource, ScheduleSource};
use cargo_schedule_watch::check::{
    acquire, preview, CheckRunner, CheckSettings, DirectionPreview, ReportRunner, RunOutcome,
    RunStatus,
};
use cargo_schedule_watch::config::{Config, ConfigOverrides, WEBHOOK_ENV};
use cargo_schedule_watch::flight::{Direction, FlightRecord, Period};
use cargo_schedule_watch::notify::{DiscordNotifier, MultiNotifier, Notifier, StdoutNotifier};
use cargo_schedule_watch::output::csv::{changes_to_csv, snapshot_to_csv};
use cargo_schedule_watch::output::json::render_json;
use cargo_schedule_watch::output::table::{
    render_changes_table, render_outcome_table, render_snapshot_table,
};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    Departure,
    Arrival,
    Both,
}

impl DirectionArg {
    fn directions(self) -> Vec<Direction> {
        match self {
            Self::Departure => vec![Direction::Departure],
            Self::Arrival => vec![Direction::Arrival],
            Self::Both => Direction::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "cargo-schedule-watch",
    about = "Cargo flight schedule change notifications"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long)]
    airport: Option<String>,
    #[arg(short, long)]
    days: Option<u32>,
    #[arg(long = "cache-dir")]
    cache_dir: Option<String>,
    #[arg(long)]
    webhook: Option<String>,
    /// Also print notifications to stdout.
    #[arg(long)]
    stdout: bool,
    #[arg(long, value_enum, default_value_t = DirectionArg::Both)]
    direction: DirectionArg,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Notify flights that are new or changed time since the last run.
    Check,
    /// Send the full schedule and refresh the cache.
    Report,
    /// Print the current schedule without touching the cache.
    Fetch,
    /// Show what `check` would notify, without notifying or writing.
    Diff,
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_env();
    config.apply_overrides(ConfigOverrides {
        airport: cli.airport.clone(),
        days: cli.days,
        cache_dir: cli.cache_dir.clone(),
        discord_webhook: cli.webhook.clone(),
        enable_stdout: cli.stdout.then_some(true),
    });

    if let Commands::Config { init, show } = &cli.command {
        handle_config_command(*init, *show, &config, &config_path)?;
        return Ok(ExitCode::SUCCESS);
    }

    let settings = CheckSettings {
        airport: config.airport.code.clone(),
        period: Period::starting(Local::now().date_naive(), config.schedule.days),
        directions: cli.direction.directions(),
    };
    let source: Arc<dyn ScheduleSource> = Arc::new(IncheonCargoSource::new(
        config.request_timeout(),
        config.request_delay(),
    )?);
    let cache = config.snapshot_cache();

    match &cli.command {
        Commands::Check => {
            let notifier = build_notifier(&config, cli.output)?;
            let runner = CheckRunner::new(settings, source, notifier, cache);
            let outcome = runner.run().await;
            print_outcome(&outcome, cli.output)?;
            Ok(ExitCode::from(outcome.status.exit_code()))
        }
        Commands::Report => {
            let notifier = build_notifier(&config, cli.output)?;
            let runner = ReportRunner::new(settings, source, notifier, cache);
            let outcome = runner.run().await;
            print_outcome(&outcome, cli.output)?;
            Ok(ExitCode::from(outcome.status.exit_code()))
        }
        Commands::Fetch => {
            let mut any = false;
            for direction in &settings.directions {
                let records = acquire(source.as_ref(), &settings, *direction).await;
                any |= !records.is_empty();
                print_snapshot(*direction, &records, cli.output)?;
            }
            Ok(if any {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Diff => {
            let previews = preview(source.as_ref(), &settings, &cache).await;
            print_previews(&previews, cli.output)?;
            Ok(ExitCode::from(RunStatus::from_previews(&previews).exit_code()))
        }
        Commands::Config { .. } => Ok(ExitCode::SUCCESS),
    }
}

/// JSON and CSV output keep stdout to themselves.
fn console_notifier(format: OutputFormat) -> StdoutNotifier {
    match format {
        OutputFormat::Table => StdoutNotifier::new(),
        OutputFormat::Json | OutputFormat::Csv => StdoutNotifier::stderr(),
    }
}

fn build_notifier(config: &Config, format: OutputFormat) -> Result<Arc<dyn Notifier>> {
    if !config.has_delivery_target() {
        return Err(anyhow!(
            "no notification target: set {WEBHOOK_ENV} or enable notify.enable_stdout"
        ));
    }
    let mut sinks: Vec<Box<dyn Notifier>> = Vec::new();
    if config.notify.enable_stdout {
        sinks.push(Box::new(console_notifier(format)));
    }
    let webhook = config.notify.discord_webhook.trim();
    if !webhook.is_empty() {
        sinks.push(Box::new(DiscordNotifier::new(
            webhook,
            config.webhook_timeout(),
        )?));
    }
    Ok(Arc::new(MultiNotifier::new(sinks)))
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &PathBuf) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(&config.redacted())?);
    }
    Ok(())
}

fn print_outcome(outcome: &RunOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_outcome_table(outcome)),
        OutputFormat::Json => println!("{}", render_json(outcome)?),
        OutputFormat::Csv => {
            warn!("CSV output for run results not implemented, using JSON");
            println!("{}", render_json(outcome)?);
        }
    }
    Ok(())
}

fn print_snapshot(direction: Direction, records: &[FlightRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_snapshot_table(direction, records)),
        OutputFormat::Json => println!("{}", render_json(records)?),
        OutputFormat::Csv => print!("{}", snapshot_to_csv(direction, records)?),
    }
    Ok(())
}

fn print_previews(previews: &[DirectionPreview], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_changes_table(previews)),
        OutputFormat::Json => println!("{}", render_json(previews)?),
        OutputFormat::Csv => print!("{}", changes_to_csv(previews)?),
    }
    Ok(())
}
