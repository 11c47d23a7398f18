//! Daemon entry point: config, pool, Horizon client, lock map, queue
//! rehydration, task spawn, and graceful shutdown (spec §4.10, §6.1).

use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use pending_deposits::collaborators::{
    Custody, Deposit, FeeFunction, NoopDeposit, Rails, SelfCustody, UnimplementedRails, WebhookNotifier,
    ZeroFee,
};
use pending_deposits::config::Config;
use pending_deposits::locks::AccountLockMap;
use pending_deposits::logging;
use pending_deposits::queue::SubmissionQueue;
use pending_deposits::repository::TransactionRepository;
use pending_deposits::shutdown;
use pending_deposits::stellar::{NetworkConfig, StellarClient};
use pending_deposits::workers::{PendingFundingChecker, RailsPoller, Scavenger, Submitter, TrustlineChecker};

/// The pending deposits processor: polls funding rails, resolves
/// destination accounts, and submits signed Stellar transactions.
#[derive(Parser, Debug)]
#[command(name = "pending-deposits")]
struct Cli {
    /// Restart the core loop after a clean exit instead of terminating.
    #[arg(long = "loop")]
    run_loop: bool,

    /// Polling interval, in seconds, passed to every periodic task.
    #[arg(short, long, default_value_t = 10)]
    interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    logging::init_tracing();

    loop {
        let mut config = Config::from_env();
        config.task_interval_secs = cli.interval;
        config.validate()?;

        if let Err(e) = run_once(config).await {
            error!(error = %e, "fatal initialization failure");
            if !cli.run_loop {
                std::process::exit(1);
            }
        }

        if !cli.run_loop {
            break;
        }

        info!(interval = cli.interval, "restarting core loop after clean exit");
        tokio::time::sleep(std::time::Duration::from_secs(cli.interval)).await;
    }

    Ok(())
}

async fn run_once(config: Config) -> anyhow::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    shutdown::acquire_heartbeat_blocking(&pool, &config).await;

    let network = NetworkConfig {
        horizon_url: config.horizon_url.clone(),
        passphrase: config.network_passphrase.clone(),
    };
    let stellar = StellarClient::new(network);

    let custody: Arc<dyn Custody> = match &config.distribution_seed {
        Some(seed) => Arc::new(SelfCustody::new(stellar.clone(), seed)?),
        None => {
            error!("DISTRIBUTION_ACCOUNT_SEED not set; refusing to start without a Custody implementation");
            anyhow::bail!("missing distribution seed");
        }
    };

    let repo = TransactionRepository::new(pool.clone());
    let locks = Arc::new(AccountLockMap::new());
    let queue = Arc::new(SubmissionQueue::new());
    let deposit_hook: Arc<dyn Deposit> = Arc::new(NoopDeposit);
    let webhook = Arc::new(WebhookNotifier::new(
        config.webhook_hmac_secret.clone(),
        config.webhook_timeout_secs,
    ));

    let rehydrated = repo.rehydration_candidates().await?;
    info!(count = rehydrated.len(), "rehydrating submission queue");
    queue.rehydrate(rehydrated).await;

    let (shutdown_tx, shutdown_rx) = shutdown::shutdown_channel();

    let rails: Arc<dyn Rails> = Arc::new(UnimplementedRails);
    let fee_fn: Arc<dyn FeeFunction> = Arc::new(ZeroFee);

    let rails_poller = RailsPoller {
        repo: repo.clone(),
        rails: rails.clone(),
        custody: custody.clone(),
        fee_fn: fee_fn.clone(),
        stellar: stellar.clone(),
        queue: queue.clone(),
        config: config.clone(),
    };

    let pending_funding_checker = PendingFundingChecker {
        repo: repo.clone(),
        stellar: stellar.clone(),
        queue: queue.clone(),
        config: config.clone(),
    };

    let trustline_checker = TrustlineChecker {
        repo: repo.clone(),
        stellar: stellar.clone(),
        queue: queue.clone(),
        config: config.clone(),
    };

    let scavenger = Scavenger {
        repo: repo.clone(),
        queue: queue.clone(),
        config: config.clone(),
    };

    let submitter = Submitter {
        repo: Arc::new(repo.clone()),
        stellar: Arc::new(stellar.clone()),
        custody: custody.clone(),
        deposit_hook,
        webhook,
        locks,
        queue: queue.clone(),
        config: config.clone(),
    };

    let heartbeat_task = tokio::spawn(shutdown::maintain_heartbeat(pool.clone(), shutdown_rx.clone()));
    let rails_task = tokio::spawn(rails_poller.run(shutdown_rx.clone()));
    // Spec §4.5 last paragraph: this poller only runs when Custody cannot
    // create destination accounts itself, otherwise `pending_funding` rows
    // never occur and the task would just poll an always-empty query.
    let pending_funding_task = if !custody.account_creation_supported() {
        Some(tokio::spawn(pending_funding_checker.run(shutdown_rx.clone())))
    } else {
        None
    };
    let trustline_task = tokio::spawn(trustline_checker.run(shutdown_rx.clone()));
    let scavenger_task = tokio::spawn(scavenger.run(shutdown_rx.clone()));
    let submitter_task = tokio::spawn(submitter.run(shutdown_rx.clone()));

    shutdown::wait_for_signal(shutdown_tx).await;

    let _ = tokio::join!(heartbeat_task, rails_task, trustline_task, scavenger_task, submitter_task);
    if let Some(task) = pending_funding_task {
        let _ = task.await;
    }

    shutdown::release_heartbeat(&pool).await;
    info!("clean shutdown complete");
    Ok(())
}
