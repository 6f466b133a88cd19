use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use newsapi_client::NewsApiClient;
use spotlight_common::Config;
use spotlight_ingest::scoring::ContentScorer;
use spotlight_ingest::store::{ArticleStore, FeedCache, MemoryStore, RunStore, SubjectStore};
use spotlight_ingest::{CredentialPool, RunCoordinator};

/// How often the scheduler wakes up to check whether a run is due.
const SCHEDULE_TICK: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "spotlight-ingest", about = "Celebrity news ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one ingestion run.
    Run {
        /// Run even if the schedule says the next run is not due yet.
        #[arg(long)]
        force: bool,
    },
    /// Run on the configured interval until interrupted.
    Schedule,
    /// Score a headline locally, without fetching anything.
    Score {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "example.org")]
        domain: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Command::Score {
        title,
        description,
        domain,
    } = &cli.command
    {
        let score = ContentScorer::default().score_text(title, description, domain);
        println!("{}", serde_json::to_string_pretty(&score)?);
        return Ok(());
    }

    let config = Config::from_env();
    config.log_redacted();

    let store = Arc::new(MemoryStore::with_subjects(&config.subjects));
    let pool = Arc::new(CredentialPool::new(config.newsapi_keys.clone()));
    let coordinator = RunCoordinator::new(
        Arc::new(NewsApiClient::new()),
        pool,
        Arc::clone(&store) as Arc<dyn SubjectStore>,
        Arc::clone(&store) as Arc<dyn ArticleStore>,
        Arc::clone(&store) as Arc<dyn RunStore>,
        store as Arc<dyn FeedCache>,
        &config,
    );

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current phase then stopping");
            signal_token.cancel();
        }
    });

    match cli.command {
        Command::Run { force } => {
            let result = if force {
                Some(coordinator.run(&cancel).await?)
            } else {
                coordinator.run_if_due(&cancel).await?
            };
            match result {
                Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                None => info!("Next run is not due yet, nothing to do"),
            }
        }
        Command::Schedule => {
            info!("Scheduler started");
            loop {
                if let Some(result) = coordinator.run_if_due(&cancel).await? {
                    info!(
                        success = result.success,
                        added = result.added,
                        "Scheduled run finished"
                    );
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(SCHEDULE_TICK) => {}
                }
            }
            info!("Scheduler stopped");
        }
        Command::Score { .. } => unreachable!("handled above"),
    }

    Ok(())
}
