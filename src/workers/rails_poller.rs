//! Rails poller (spec §4.4): the primary source of new work. Every
//! `task_interval`, ask Rails which candidates are now funded, validate
//! and persist the amounts it reports, then either park the row awaiting
//! external funding or hand it to the account checker.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::collaborators::{Custody, FeeFunction, Rails};
use crate::config::Config;
use crate::models::DepositTransaction;
use crate::queue::SubmissionQueue;
use crate::repository::TransactionRepository;
use crate::stellar::StellarClient;
use crate::workers::account_checker;

pub struct RailsPoller {
    pub repo: TransactionRepository,
    pub rails: Arc<dyn Rails>,
    pub custody: Arc<dyn Custody>,
    pub fee_fn: Arc<dyn FeeFunction>,
    pub stellar: StellarClient,
    pub queue: Arc<SubmissionQueue>,
    pub config: Config,
}

impl RailsPoller {
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.task_interval());
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!(error = %e, "rails poller cycle failed");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("rails poller shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        let candidates = self.repo.fetch_rails_candidates().await?;
        if candidates.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = candidates.iter().map(|t| t.id).collect();
        let funded = self.rails.poll_pending_deposits(&ids).await?;
        if funded.is_empty() {
            return Ok(());
        }

        let by_id: std::collections::HashMap<Uuid, DepositTransaction> =
            candidates.into_iter().map(|t| (t.id, t)).collect();

        let mut ready_for_account_check = Vec::new();

        for funded_deposit in funded {
            let Some(transaction) = by_id.get(&funded_deposit.transaction_id) else {
                continue;
            };

            if !transaction.kind.is_supported() {
                warn!(id = %transaction.id, "rails returned a transaction of unsupported kind");
                self.repo
                    .mark_failed(transaction.id, "rails returned a non-deposit transaction")
                    .await?;
                continue;
            }

            if funded_deposit.amount_in == BigDecimal::from(0) {
                self.repo
                    .mark_failed(transaction.id, "rails reported amount_in = 0")
                    .await?;
                continue;
            }

            let amount_fee = if transaction.is_quoted() {
                let (Some(fee), Some(_)) = (funded_deposit.amount_fee.clone(), funded_deposit.amount_out.clone())
                else {
                    self.repo
                        .mark_failed(
                            transaction.id,
                            "quoted transaction missing amount_fee or amount_out",
                        )
                        .await?;
                    continue;
                };
                fee
            } else {
                match funded_deposit.amount_fee.clone() {
                    Some(fee) => fee,
                    None => crate::collaborators::fee::resolve_missing_fee(&*self.fee_fn, transaction),
                }
            };

            self.repo
                .persist_funded_amounts(
                    transaction.id,
                    &funded_deposit.amount_in,
                    &amount_fee,
                    funded_deposit.amount_out.as_ref(),
                )
                .await?;

            if !self.custody.account_creation_supported() {
                self.repo.mark_pending_funding(transaction.id).await?;
            } else {
                ready_for_account_check.push(transaction.clone());
            }
        }

        if !ready_for_account_check.is_empty() {
            account_checker::check_candidates(
                &self.repo,
                &self.stellar,
                &self.queue,
                ready_for_account_check,
            )
            .await;
        }

        Ok(())
    }
}
