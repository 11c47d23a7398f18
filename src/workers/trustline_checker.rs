//! Trustline checker (spec §4.7): re-checks destination trustlines for
//! rows parked in `pending_trust` and re-queues once established.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::queue::SubmissionQueue;
use crate::repository::TransactionRepository;
use crate::stellar::types::resolve_destination;
use crate::stellar::StellarClient;

pub struct TrustlineChecker {
    pub repo: TransactionRepository,
    pub stellar: StellarClient,
    pub queue: Arc<SubmissionQueue>,
    pub config: Config,
}

impl TrustlineChecker {
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.task_interval());
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!(error = %e, "trustline checker cycle failed");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("trustline checker shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        let candidates = self.repo.fetch_pending_trust_candidates().await?;
        for transaction in candidates {
            let resolved = match resolve_destination(&transaction.to_address) {
                Ok(r) => r,
                Err(e) => {
                    // Configuration/programming error (spec §7.1), not a
                    // transient condition: a malformed address will never
                    // start decoding on a later tick, so this is terminal
                    // rather than an indefinite skip.
                    warn!(id = %transaction.id, error = %e, "could not resolve destination address");
                    self.repo
                        .mark_failed(
                            transaction.id,
                            &format!("undecodable destination address: {e}"),
                        )
                        .await?;
                    continue;
                }
            };

            let account = match self.stellar.get_account(&resolved.base_account).await {
                Ok(account) => account,
                Err(e) => {
                    warn!(id = %transaction.id, error = %e, "horizon error rechecking trustline, will retry");
                    continue;
                }
            };

            if account.has_trustline(&transaction.asset.code, &transaction.asset.issuer) {
                let had_envelope = transaction.envelope_xdr.is_some();
                self.repo.mark_ready_for_submission(transaction.id).await?;
                if had_envelope {
                    self.repo.strip_stale_create_account_envelope(transaction.id).await?;
                }
                self.queue.push(transaction.id).await;
            }
        }
        Ok(())
    }
}
