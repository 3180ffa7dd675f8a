//! Mailwave - campaign dispatcher entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use mailwave_common::config::Config;
use mailwave_core::{
    seed_demo, Dispatcher, DueMailingScheduler, MailingService, ReportService, SmtpMailer,
    SystemClock,
};
use mailwave_storage::db::DatabasePool;
use mailwave_storage::repository::attempts::DbMailingAttemptRepository;
use mailwave_storage::repository::locks::DbLockProvider;
use mailwave_storage::repository::logs::DbMailingLogRepository;
use mailwave_storage::repository::mailings::DbMailingRepository;
use mailwave_storage::repository::messages::DbMessageRepository;
use mailwave_storage::repository::recipients::DbRecipientRepository;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(author, version, about = "Mailwave campaign dispatcher")]
struct Cli {
    /// Path to TOML config file (default: ./mailwave.toml, /etc/mailwave/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Actor recorded in logs and attempts for manual runs
    #[arg(long)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Dispatch one mailing now, regardless of its time window
    Send {
        mailing_id: Uuid,

        /// Log what would be sent without delivering anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one due-mailing scan, then exit
    SendDue,
    /// Poll for due mailings until interrupted
    Scheduler {
        /// Override the configured poll interval, in seconds
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Print the send/failure rollup for one mailing
    Stats { mailing_id: Uuid },
    /// Print the rollup across every mailing of one owner
    OwnerStats { owner: String },
    /// Seed demo recipients, a message and an open mailing
    SeedDemo {
        /// Owner the demo data belongs to
        #[arg(long)]
        owner: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    init_logging(&config);

    let db_pool = DatabasePool::new(&config.database).await?;
    db_pool.migrate().await?;

    let mailings = Arc::new(DbMailingRepository::new(db_pool.clone()));
    let messages = Arc::new(DbMessageRepository::new(db_pool.clone()));
    let logs = Arc::new(DbMailingLogRepository::new(db_pool.clone()));
    let attempts = Arc::new(DbMailingAttemptRepository::new(db_pool.clone()));
    let clock = Arc::new(SystemClock);

    let dispatcher = Arc::new(Dispatcher::new(
        mailings.clone(),
        messages.clone(),
        logs.clone(),
        attempts.clone(),
        Arc::new(SmtpMailer::new(&config.smtp)?),
        clock.clone(),
        config.smtp.from_address.clone(),
    ));

    match cli.command {
        Commands::Send {
            mailing_id,
            dry_run,
        } => {
            let outcome = dispatcher
                .send_by_id(mailing_id, cli.actor.as_deref(), dry_run)
                .await?;
            if dry_run {
                println!(
                    "dry run: {} recipient(s) logged, nothing delivered",
                    outcome.total
                );
            } else {
                println!(
                    "sent {} of {} recipients ({} skipped)",
                    outcome.sent, outcome.total, outcome.skipped
                );
            }
        }
        Commands::SendDue => {
            let scheduler = DueMailingScheduler::new(
                dispatcher,
                mailings.clone(),
                Arc::new(DbLockProvider::new(db_pool.clone())),
                clock,
                config.scheduler.clone(),
            );
            let processed = scheduler.tick().await?;
            println!("dispatched {} due mailing(s)", processed);
        }
        Commands::Scheduler { interval } => {
            let mut scheduler_config = config.scheduler.clone();
            if let Some(secs) = interval {
                scheduler_config.poll_interval_secs = secs;
            }

            let scheduler = DueMailingScheduler::new(
                dispatcher,
                mailings.clone(),
                Arc::new(DbLockProvider::new(db_pool.clone())),
                clock,
                scheduler_config,
            );

            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
            tokio::spawn(async move {
                shutdown_signal().await;
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            });

            scheduler.run(shutdown_rx).await;
        }
        Commands::Stats { mailing_id } => {
            let reports = reports(mailings, logs, attempts, &config);
            let stats = reports.mailing_stats(mailing_id).await?;
            println!(
                "sent={} failed={} dry_run={} attempts: success={} fail={}",
                stats.sent, stats.failed, stats.dry_run, stats.attempt_success, stats.attempt_fail
            );
        }
        Commands::SeedDemo { owner } => {
            let recipients = DbRecipientRepository::new(db_pool.clone());
            let service = MailingService::new(mailings.clone(), messages.clone(), clock.clone());
            let outcome = seed_demo(
                &recipients,
                messages.as_ref(),
                &service,
                clock.as_ref(),
                &owner,
            )
            .await?;
            println!(
                "seeded {} recipient(s), message {}, mailing {}",
                outcome.recipient_ids.len(),
                outcome.message_id,
                outcome.mailing_id
            );
        }
        Commands::OwnerStats { owner } => {
            let reports = reports(mailings, logs, attempts, &config);
            let stats = reports.owner_summary(&owner).await?;
            println!(
                "sent={} failed={} dry_run={} attempts: success={} fail={}",
                stats.sent, stats.failed, stats.dry_run, stats.attempt_success, stats.attempt_fail
            );
        }
    }

    Ok(())
}

fn reports(
    mailings: Arc<DbMailingRepository>,
    logs: Arc<DbMailingLogRepository>,
    attempts: Arc<DbMailingAttemptRepository>,
    config: &Config,
) -> ReportService {
    ReportService::new(
        mailings,
        logs,
        attempts,
        Duration::from_secs(config.reporting.stats_cache_ttl_secs),
    )
}

/// Resolve on SIGINT or SIGTERM, whichever arrives first. Service
/// managers stop with SIGTERM, so ctrl-c alone is not enough.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},mailwave=debug", config.logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
