//! Unblocked/signed scavenger (spec §2, §4.3 "producers" list, design
//! note §9). Re-enqueues transactions the operator has manually moved
//! out of `blocked`, and multi-sig transactions whose signatures have
//! been collected.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::config::Config;
use crate::queue::SubmissionQueue;
use crate::repository::TransactionRepository;

pub struct Scavenger {
    pub repo: TransactionRepository,
    pub queue: Arc<SubmissionQueue>,
    pub config: Config,
}

impl Scavenger {
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.task_interval());
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!(error = %e, "scavenger cycle failed");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("scavenger shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        let candidates = self.repo.fetch_scavenger_candidates().await?;
        for transaction in candidates {
            self.repo.mark_ready_for_submission(transaction.id).await?;
            self.queue.push(transaction.id).await;
        }
        Ok(())
    }
}
