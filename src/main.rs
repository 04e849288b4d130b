//! # NudgeClaw — Reminder Decision Core
//!
//! Decides who gets nudged about which work item, when, and how urgently.
//!
//! Usage:
//!   nudgeclaw run --items ./items.json            # Daemon: sweep + deliver
//!   nudgeclaw sweep --items ./items.json          # One sweep pass, then exit
//!   nudgeclaw queue maria --items ./items.json    # Show a user's queue
//!   nudgeclaw init-config                         # Write default config

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use nudgeclaw_core::config::NudgeConfig;
use nudgeclaw_core::traits::{
    ContentGenerator, ContentValidator, DeliveryChannel, PersistentStore, WorkItemSource,
};
use nudgeclaw_pipeline::{
    spawn_driver, ConsoleChannel, Driver, HeuristicValidator, PipelineOrchestrator,
    ReminderService, TemplateGenerator, WebhookChannel,
};
use nudgeclaw_scheduler::{SchedulerEngine, SqliteStore};

mod source;
use source::FileWorkItemSource;

#[derive(Parser)]
#[command(
    name = "nudgeclaw",
    version,
    about = "🔔 NudgeClaw — decides who gets nudged, when, and how urgently"
)]
struct Cli {
    /// Config file path
    #[arg(long, default_value = "~/.nudgeclaw/config.toml")]
    config: String,

    /// Database path
    #[arg(long, default_value = "~/.nudgeclaw/nudge.db")]
    db_path: String,

    /// Work items file (JSON array)
    #[arg(long, default_value = "./items.json")]
    items: String,

    /// Deliver via webhook instead of the console
    #[arg(long)]
    webhook: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon: periodic sweeps plus the delivery loop
    Run {
        /// Seconds between candidate sweeps
        #[arg(long, default_value = "3600")]
        sweep_interval_secs: u64,

        /// Restrict sweeps to one project
        #[arg(long)]
        project: Option<String>,
    },
    /// One sweep pass: schedule reminders and exit
    Sweep {
        #[arg(long)]
        project: Option<String>,
    },
    /// Show a user's pending notification queue
    Queue { user: String },
    /// Cancel a pending notification by id
    Cancel { id: String },
    /// Write the default config file and exit
    InitConfig,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

struct App {
    service: ReminderService,
    driver: Arc<Driver>,
    /// Kept concrete so the daemon can reload the file between sweeps.
    items: Arc<FileWorkItemSource>,
}

fn build_app(cli: &Cli, config: &NudgeConfig) -> Result<App> {
    let db_path = expand_path(&cli.db_path);
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let store: Arc<dyn PersistentStore> =
        Arc::new(SqliteStore::open(Path::new(&db_path)).context("open database")?);
    let items_path = expand_path(&cli.items);
    let items = Arc::new(
        FileWorkItemSource::load(Path::new(&items_path)).context("load work items")?,
    );
    let source: Arc<dyn WorkItemSource> = Arc::clone(&items) as _;
    let channel: Arc<dyn DeliveryChannel> = match &cli.webhook {
        Some(url) => Arc::new(WebhookChannel::new(url, Vec::new())),
        None => Arc::new(ConsoleChannel),
    };
    let generator: Arc<dyn ContentGenerator> = Arc::new(TemplateGenerator::new());
    let validator: Arc<dyn ContentValidator> =
        Arc::new(HeuristicValidator::new(config.pipeline.min_quality_score));

    let engine = Arc::new(Mutex::new(SchedulerEngine::new(config, Arc::clone(&store))));
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        config,
        Arc::clone(&source),
        generator,
        validator,
        channel,
        Arc::clone(&store),
        Arc::clone(&engine),
    ));
    let service = ReminderService::new(config, source, store, Arc::clone(&engine));
    let driver = Arc::new(Driver::new(engine, orchestrator, config.pipeline.max_per_tick));

    Ok(App {
        service,
        driver,
        items,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "nudgeclaw=debug,nudgeclaw_scheduler=debug,nudgeclaw_pipeline=debug"
    } else {
        "nudgeclaw=info,nudgeclaw_scheduler=info,nudgeclaw_pipeline=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = expand_path(&cli.config);
    let config = if Path::new(&config_path).exists() {
        NudgeConfig::load_from(Path::new(&config_path)).context("load config")?
    } else {
        tracing::info!("📝 No config at {config_path}, using defaults");
        NudgeConfig::default()
    };
    config.validate().context("validate config")?;

    match &cli.command {
        Command::InitConfig => {
            config.save().context("write config")?;
            println!("Wrote default config to {}", NudgeConfig::default_path().display());
            return Ok(());
        }
        Command::Sweep { project } => {
            let app = build_app(&cli, &config)?;
            let report = app.service.sweep(project.as_deref(), Utc::now()).await?;
            println!(
                "Sweep: {} candidate(s), {} scheduled, {} vetoed, {} unassigned",
                report.candidates, report.scheduled, report.vetoed, report.skipped_unassigned
            );
        }
        Command::Queue { user } => {
            let app = build_app(&cli, &config)?;
            let queue = app.service.queue_for(user).await;
            if queue.is_empty() {
                println!("No pending notifications for {user}");
            } else {
                for n in queue {
                    println!(
                        "{}  {}  {}  prio {}  at {}  ({:?}, attempt {}/{})",
                        n.id,
                        n.notification_type,
                        n.item_id,
                        n.composite_priority,
                        n.scheduled_for.to_rfc3339(),
                        n.status,
                        n.attempts,
                        n.max_attempts
                    );
                }
            }
        }
        Command::Cancel { id } => {
            let app = build_app(&cli, &config)?;
            if app.service.cancel(id).await {
                println!("Cancelled {id}");
            } else {
                println!("No live notification with id {id}");
                std::process::exit(1);
            }
        }
        Command::Run {
            sweep_interval_secs,
            project,
        } => {
            let app = build_app(&cli, &config)?;
            tracing::info!(
                "🚀 NudgeClaw daemon starting (sweep every {}s, tick every {}s)",
                sweep_interval_secs,
                config.pipeline.tick_secs
            );

            let driver = Arc::clone(&app.driver);
            let tick_secs = config.pipeline.tick_secs;
            tokio::spawn(async move {
                spawn_driver(driver, tick_secs).await;
            });

            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(*sweep_interval_secs));
            loop {
                interval.tick().await;
                match app.items.reload().await {
                    Ok(count) => tracing::debug!("📋 Reloaded {count} work item(s)"),
                    Err(e) => tracing::warn!(
                        "⚠️ Work item reload failed, sweeping the last snapshot: {e}"
                    ),
                }
                match app.service.sweep(project.as_deref(), Utc::now()).await {
                    Ok(report) => {
                        if report.scheduled > 0 {
                            tracing::info!(
                                "📥 Sweep scheduled {} reminder(s)",
                                report.scheduled
                            );
                        }
                    }
                    Err(e) => tracing::error!("❌ Sweep failed: {e}"),
                }
            }
        }
    }
    Ok(())
}
