//! Account checker (spec §4.5). Shared between two entry points: the
//! rails poller hands it a batch directly (in-process fan-out, the way
//! the original `process_deposit` call chain did), and a standalone
//! periodic task polls `pending_funding` rows when Custody cannot create
//! destination accounts itself.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::DepositTransaction;
use crate::queue::SubmissionQueue;
use crate::repository::TransactionRepository;
use crate::stellar::types::resolve_destination;
use crate::stellar::StellarClient;

/// Outcome of checking one candidate against Horizon (spec §4.5).
enum Decision {
    /// Destination doesn't exist yet; account creation is fused into the
    /// submission step, so this is still "ready" for the queue.
    ReadyAccountMissing,
    /// Destination exists with the right trustline, or claimable
    /// balances cover the no-trustline case.
    Ready,
    /// Destination exists, no trustline, and the client can't accept a
    /// claimable balance instead.
    PendingTrust,
    /// A transient Horizon error; retry next interval, no row mutation.
    Skip,
    /// `to_address` doesn't decode as a Stellar address at all — a
    /// configuration/programming error (spec §7.1), not a retryable
    /// condition: retrying forever would never make a malformed address
    /// decode.
    InvalidAddress(String),
}

async fn decide(stellar: &StellarClient, transaction: &DepositTransaction) -> Decision {
    let resolved = match resolve_destination(&transaction.to_address) {
        Ok(r) => r,
        Err(e) => {
            warn!(id = %transaction.id, error = %e, "could not resolve destination address");
            return Decision::InvalidAddress(e.to_string());
        }
    };

    match stellar.get_account(&resolved.base_account).await {
        Err(crate::error::StellarError::AccountNotFound) => Decision::ReadyAccountMissing,
        Err(e) => {
            warn!(id = %transaction.id, error = %e, "horizon error checking destination account, will retry");
            Decision::Skip
        }
        Ok(account) => {
            let has_trustline =
                account.has_trustline(&transaction.asset.code, &transaction.asset.issuer);
            if !has_trustline && !transaction.claimable_balance_supported {
                Decision::PendingTrust
            } else {
                Decision::Ready
            }
        }
    }
}

pub async fn check_candidates(
    repo: &TransactionRepository,
    stellar: &StellarClient,
    queue: &SubmissionQueue,
    candidates: Vec<DepositTransaction>,
) {
    for transaction in candidates {
        match decide(stellar, &transaction).await {
            Decision::Skip => continue,
            Decision::InvalidAddress(reason) => {
                if let Err(e) = repo
                    .mark_failed(transaction.id, &format!("undecodable destination address: {reason}"))
                    .await
                {
                    error!(id = %transaction.id, error = %e, "failed to mark transaction error");
                }
            }
            Decision::PendingTrust => {
                if let Err(e) = repo.mark_pending_trust(transaction.id, false).await {
                    error!(id = %transaction.id, error = %e, "failed to park transaction pending_trust");
                }
            }
            Decision::Ready | Decision::ReadyAccountMissing => {
                if let Err(e) = repo.mark_ready_for_submission(transaction.id).await {
                    error!(id = %transaction.id, error = %e, "failed to mark transaction ready");
                    continue;
                }
                queue.push(transaction.id).await;
            }
        }
    }
}

/// The parallel `pending_funding` poller (spec §4.5 last paragraph):
/// only runs when Custody does not itself create destination accounts.
pub struct PendingFundingChecker {
    pub repo: TransactionRepository,
    pub stellar: StellarClient,
    pub queue: Arc<SubmissionQueue>,
    pub config: Config,
}

impl PendingFundingChecker {
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.task_interval());
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.repo.fetch_pending_funding_candidates().await {
                        Ok(candidates) if !candidates.is_empty() => {
                            check_candidates(&self.repo, &self.stellar, &self.queue, candidates).await;
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "pending_funding poll failed"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("pending_funding checker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
