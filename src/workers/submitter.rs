//! The Submitter (spec §4.8): the only consumer of the submission queue.
//! Coordinates locks, delegates to Custody, observes the Horizon result,
//! drives the state machine, and invokes the post-deposit hook.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::collaborators::custody::DistributionAccount;
use crate::collaborators::{Custody, Deposit, WebhookNotifier};
use crate::config::Config;
use crate::error::{RepositoryError, SubmissionOutcome};
use crate::locks::AccountLockMap;
use crate::models::DepositTransaction;
use crate::queue::SubmissionQueue;
use crate::repository::SubmitterStore;
use crate::stellar::envelope::extract_claimable_balance_id;
use crate::stellar::types::resolve_destination;
use crate::stellar::Horizon;

enum SubmissionPath {
    CreateAccount,
    Deposit { has_trustline: bool },
}

pub struct Submitter {
    pub repo: Arc<dyn SubmitterStore>,
    pub stellar: Arc<dyn Horizon>,
    pub custody: Arc<dyn Custody>,
    pub deposit_hook: Arc<dyn Deposit>,
    pub webhook: Arc<WebhookNotifier>,
    pub locks: Arc<AccountLockMap>,
    pub queue: Arc<SubmissionQueue>,
    pub config: Config,
}

impl Submitter {
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                id = self.queue.pop() => {
                    if let Err(e) = self.process_one(id).await {
                        error!(id = %id, error = %e, "submitter failed to process transaction");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("submitter shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn process_one(&self, id: Uuid) -> anyhow::Result<()> {
        let mut transaction = self.repo.get(id).await?;

        if !matches!(
            transaction.status,
            crate::state_machine::Status::PendingUserTransferStart
                | crate::state_machine::Status::PendingExternal
                | crate::state_machine::Status::PendingAnchor
                | crate::state_machine::Status::PendingTrust
        ) {
            // Spec §4.8 step 1: a dequeued row outside these states is a
            // programming error, not a retryable condition. Terminal for
            // this row; does not crash the daemon (§7.2).
            return Err(crate::error::SubmitError::InvalidState {
                id,
                status: format!("{:?}", transaction.status),
                submission_status: format!("{:?}", transaction.submission_status),
            }
            .into());
        }

        self.repo.mark_processing(id).await?;
        self.notify(&transaction, "pending_anchor", Some("processing")).await;

        let mut attempts = 0u32;

        loop {
            let outcome = self.attempt_submission(&transaction).await;

            match outcome {
                Ok(AttemptResult::Completed) => return Ok(()),
                Ok(AttemptResult::ParkedPendingTrust) => return Ok(()),
                Ok(AttemptResult::Requeued) => return Ok(()),
                Err(SubmissionOutcome::Pending) => {
                    attempts += 1;
                    self.repo.mark_retry_pending(id).await?;
                    if attempts >= self.config.submit_max_retries {
                        warn!(id = %id, attempts, "submission pending storm exceeded retry budget, giving up");
                        self.repo
                            .mark_failed(id, "exceeded retry budget while custody reported pending")
                            .await?;
                        self.notify(&transaction, "error", Some("failed")).await;
                        return Ok(());
                    }
                    transaction = self.repo.get(id).await?;
                    continue;
                }
                Err(SubmissionOutcome::Blocked { reason }) => {
                    let reason = crate::logging::redact_sensitive_data(&reason);
                    self.repo.mark_blocked(id, &reason).await?;
                    self.notify(&transaction, "pending_anchor", Some("blocked")).await;
                    return Ok(());
                }
                Err(SubmissionOutcome::Failed { reason }) => {
                    let reason = crate::logging::redact_sensitive_data(&reason);
                    self.repo.mark_failed(id, &reason).await?;
                    self.notify(&transaction, "error", Some("failed")).await;
                    crate::metrics::counter("deposits_failed_total", "").increment(1);
                    return Ok(());
                }
                Err(SubmissionOutcome::Ok { .. }) => unreachable!("Ok is not an attempt-loop error arm"),
            }
        }
    }

    /// One pass through steps 3-6 of spec §4.8. Returns `Ok` for a
    /// resting outcome that exits the loop, or the `SubmissionOutcome`
    /// error arm the retry policy table (§4.8 "Retry policy") dispatches on.
    async fn attempt_submission(
        &self,
        transaction: &DepositTransaction,
    ) -> Result<AttemptResult, SubmissionOutcome> {
        debug!(
            id = %transaction.id,
            to_address = %crate::logging::mask_wallet_address(&transaction.to_address),
            "attempting submission"
        );

        let distribution_account = self
            .custody
            .get_distribution_account(&transaction.asset)
            .await;

        let _source_guard = match &distribution_account {
            DistributionAccount::Account(account) => Some(self.locks.acquire_source(account).await),
            DistributionAccount::NotSupported => None,
        };

        let resolved = resolve_destination(&transaction.to_address)
            .map_err(|e| SubmissionOutcome::Failed { reason: e.to_string() })?;

        let destination = self.stellar.get_account(&resolved.base_account).await;

        let (path, has_trustline) = match destination {
            Err(crate::error::StellarError::AccountNotFound) => (SubmissionPath::CreateAccount, false),
            Err(e) => return Err(SubmissionOutcome::Failed { reason: e.to_string() }),
            Ok(account) => {
                let has_trustline =
                    account.has_trustline(&transaction.asset.code, &transaction.asset.issuer);
                if !has_trustline && !transaction.claimable_balance_supported {
                    drop(_source_guard);
                    self.repo
                        .mark_pending_trust(transaction.id, false)
                        .await
                        .map_err(repository_err)?;
                    return Ok(AttemptResult::ParkedPendingTrust);
                }
                if transaction.envelope_xdr.is_some() {
                    self.repo
                        .strip_stale_create_account_envelope(transaction.id)
                        .await
                        .map_err(repository_err)?;
                }
                (SubmissionPath::Deposit { has_trustline }, has_trustline)
            }
        };

        let custody_result = match &path {
            SubmissionPath::CreateAccount => self.custody.create_destination_account(transaction).await,
            SubmissionPath::Deposit { .. } => {
                self.custody
                    .submit_deposit_transaction(transaction, has_trustline)
                    .await
            }
        };

        drop(_source_guard);

        let hash = custody_result.map_err(|e| e.into_outcome())?;

        let horizon_tx = self
            .stellar
            .get_transaction(&hash)
            .await
            .map_err(|e| SubmissionOutcome::Failed { reason: e.to_string() })?;

        if !horizon_tx.successful {
            return Err(SubmissionOutcome::Failed {
                reason: horizon_tx.result_xdr,
            });
        }

        match path {
            SubmissionPath::Deposit { .. } => {
                let claimable_balance_id = if transaction.claimable_balance_supported {
                    extract_claimable_balance_id(&horizon_tx.result_xdr).ok().flatten()
                } else {
                    None
                };

                let amount_out = transaction.completed_amount_out();

                self.repo
                    .mark_completed(
                        transaction.id,
                        &hash,
                        &horizon_tx.paging_token,
                        claimable_balance_id.as_deref(),
                        &amount_out,
                    )
                    .await
                    .map_err(repository_err)?;

                self.notify(transaction, "completed", Some("completed")).await;
                crate::metrics::counter("deposits_completed_total", "").increment(1);

                if let Err(e) = self.deposit_hook.after_deposit(transaction).await {
                    warn!(id = %transaction.id, error = %e, "after_deposit hook failed, non-fatal");
                }

                Ok(AttemptResult::Completed)
            }
            SubmissionPath::CreateAccount => {
                if transaction.claimable_balance_supported {
                    self.repo
                        .mark_ready_for_submission(transaction.id)
                        .await
                        .map_err(repository_err)?;
                    self.queue.push(transaction.id).await;
                    Ok(AttemptResult::Requeued)
                } else {
                    self.repo
                        .mark_pending_trust(transaction.id, false)
                        .await
                        .map_err(repository_err)?;
                    Ok(AttemptResult::ParkedPendingTrust)
                }
            }
        }
    }

    /// Fire-and-forget (spec §6.4): spawned onto its own task so a slow or
    /// unreachable webhook endpoint never delays the state transition that
    /// triggered it.
    async fn notify(&self, transaction: &DepositTransaction, status: &str, submission_status: Option<&str>) {
        if let Some(url) = transaction.webhook_url.clone() {
            let event = crate::collaborators::webhook::StatusChangeEvent {
                transaction_id: transaction.id,
                status: status.to_string(),
                submission_status: submission_status.map(|s| s.to_string()),
                status_message: transaction.status_message.clone(),
            };
            let webhook = self.webhook.clone();
            tokio::spawn(async move {
                webhook.notify(&url, &event).await;
            });
        }
    }
}

enum AttemptResult {
    Completed,
    ParkedPendingTrust,
    Requeued,
}

fn repository_err(e: RepositoryError) -> SubmissionOutcome {
    SubmissionOutcome::Failed { reason: e.to_string() }
}
