//! Authoritative persistence for `DepositTransaction` rows: the single
//! place row mutation happens, so that the "sole writer" invariant
//! (§6.5) is enforced by construction rather than convention.
//!
//! Grounded on `onramp_processor.rs`'s raw sqlx queries (`FOR UPDATE
//! SKIP LOCKED` claim pattern, `sqlx::query_as::<_, T>` typed fetches).

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::DepositTransaction;
use crate::queue::SUBMIT_TRANSACTION_QUEUE;

/// The repository surface the submitter depends on (spec §4.8). Exists
/// so the submission attempt loop can be driven against a mock store in
/// tests instead of a live Postgres connection.
#[async_trait]
pub trait SubmitterStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<DepositTransaction, RepositoryError>;
    async fn mark_processing(&self, id: Uuid) -> Result<(), RepositoryError>;
    async fn mark_retry_pending(&self, id: Uuid) -> Result<(), RepositoryError>;
    async fn mark_blocked(&self, id: Uuid, message: &str) -> Result<(), RepositoryError>;
    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), RepositoryError>;
    async fn mark_pending_trust(&self, id: Uuid, clear_stale_envelope: bool) -> Result<(), RepositoryError>;
    async fn strip_stale_create_account_envelope(&self, id: Uuid) -> Result<(), RepositoryError>;
    async fn mark_ready_for_submission(&self, id: Uuid) -> Result<(), RepositoryError>;
    #[allow(clippy::too_many_arguments)]
    async fn mark_completed(
        &self,
        id: Uuid,
        stellar_transaction_id: &str,
        paging_token: &str,
        claimable_balance_id: Option<&str>,
        amount_out: &BigDecimal,
    ) -> Result<(), RepositoryError>;
}

#[derive(Clone)]
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<DepositTransaction, RepositoryError> {
        sqlx::query_as::<_, DepositTransaction>(
            "SELECT t.*, a.code, a.issuer, a.significant_decimals, a.distribution_account
             FROM transactions t JOIN assets a ON a.id = t.asset_id
             WHERE t.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound { id })
    }

    /// Rails poller candidates (spec §4.4 step 1): unconfirmed deposits of
    /// a supported kind, claimed with `FOR UPDATE SKIP LOCKED` so two
    /// processor instances (or overlapping ticks) never double-claim a row.
    pub async fn fetch_rails_candidates(&self) -> Result<Vec<DepositTransaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, DepositTransaction>(
            "SELECT t.*, a.code, a.issuer, a.significant_decimals, a.distribution_account
             FROM transactions t JOIN assets a ON a.id = t.asset_id
             WHERE t.status IN ('pending_user_transfer_start', 'pending_external')
               AND t.kind IN ('deposit', 'deposit-exchange')
             ORDER BY t.id
             FOR UPDATE OF t SKIP LOCKED",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Spec §4.5 second paragraph: rows parked awaiting external funding
    /// when Custody cannot create destination accounts.
    pub async fn fetch_pending_funding_candidates(
        &self,
    ) -> Result<Vec<DepositTransaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, DepositTransaction>(
            "SELECT t.*, a.code, a.issuer, a.significant_decimals, a.distribution_account
             FROM transactions t JOIN assets a ON a.id = t.asset_id
             WHERE t.status = 'pending_user' AND t.submission_status = 'pending_funding'
               AND t.kind IN ('deposit', 'deposit-exchange')
             ORDER BY t.id
             FOR UPDATE OF t SKIP LOCKED",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Spec §4.7: rows parked waiting for a trustline.
    pub async fn fetch_pending_trust_candidates(
        &self,
    ) -> Result<Vec<DepositTransaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, DepositTransaction>(
            "SELECT t.*, a.code, a.issuer, a.significant_decimals, a.distribution_account
             FROM transactions t JOIN assets a ON a.id = t.asset_id
             WHERE t.status = 'pending_trust' AND t.submission_status = 'pending_trust'
               AND t.kind IN ('deposit', 'deposit-exchange')
             ORDER BY t.id
             FOR UPDATE OF t SKIP LOCKED",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Scavenger candidates (spec §2, design note §9 "disjunctive query"
    /// open question): operator-unblocked rows, OR rows with a signed
    /// multi-sig envelope that were never blocked. Preserved as a
    /// disjunction per the open-question decision in DESIGN.md, but both
    /// arms are scoped to `status = 'pending_anchor'` and a supported
    /// `kind`, matching `get_ready_multisig_deposits` in original_source
    /// `process_pending_deposits.py` (`status=pending_anchor,
    /// kind=deposit, pending_signatures=False, envelope_xdr__isnull=False`).
    /// Without the `status` guard the multisig disjunct would also match
    /// terminal `completed`/`error` rows and operator-held `blocked` rows
    /// that happen to still carry a non-null `envelope_xdr`.
    pub async fn fetch_scavenger_candidates(&self) -> Result<Vec<DepositTransaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, DepositTransaction>(
            "SELECT t.*, a.code, a.issuer, a.significant_decimals, a.distribution_account
             FROM transactions t JOIN assets a ON a.id = t.asset_id
             WHERE t.status = 'pending_anchor'
               AND t.kind IN ('deposit', 'deposit-exchange')
               AND (t.submission_status = 'unblocked'
                    OR (t.envelope_xdr IS NOT NULL AND t.pending_signatures = false
                        AND t.submission_status != 'ready'))
             ORDER BY t.id
             FOR UPDATE OF t SKIP LOCKED",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Startup queue rehydration (spec §4.3): all rows still claiming
    /// queue membership, ordered by ascending `queued_at`.
    pub async fn rehydration_candidates(&self) -> Result<Vec<Uuid>, RepositoryError> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM transactions
             WHERE queue = $1
               AND submission_status IN ('ready', 'processing')
               AND kind IN ('deposit', 'deposit-exchange')
               AND queued_at IS NOT NULL
             ORDER BY queued_at ASC",
        )
        .bind(SUBMIT_TRANSACTION_QUEUE)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    pub async fn persist_funded_amounts(
        &self,
        id: Uuid,
        amount_in: &BigDecimal,
        amount_fee: &BigDecimal,
        amount_out: Option<&BigDecimal>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE transactions SET amount_in = $2, amount_fee = $3, amount_out = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(amount_in)
        .bind(amount_fee)
        .bind(amount_out)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_pending_funding(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE transactions SET status = 'pending_user', submission_status = 'pending_funding' WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Producers always persist `queue`, `queued_at`, `submission_status
    /// = ready` before enqueueing (spec §4.3).
    pub async fn mark_ready_for_submission(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE transactions
             SET status = 'pending_anchor', submission_status = 'ready',
                 queue = $2, queued_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(SUBMIT_TRANSACTION_QUEUE)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_pending_trust(&self, id: Uuid, clear_stale_envelope: bool) -> Result<(), RepositoryError> {
        if clear_stale_envelope {
            sqlx::query(
                "UPDATE transactions
                 SET status = 'pending_trust', submission_status = 'pending_trust',
                     queue = NULL, queued_at = NULL,
                     envelope_xdr = NULL, stellar_transaction_id = NULL
                 WHERE id = $1",
            )
        } else {
            sqlx::query(
                "UPDATE transactions
                 SET status = 'pending_trust', submission_status = 'pending_trust',
                     queue = NULL, queued_at = NULL
                 WHERE id = $1",
            )
        }
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_processing(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE transactions SET status = 'pending_anchor', submission_status = 'processing' WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_retry_pending(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE transactions SET submission_status = 'pending' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_blocked(&self, id: Uuid, message: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE transactions
             SET submission_status = 'blocked', queue = NULL, queued_at = NULL, status_message = $2
             WHERE id = $1",
        )
        .bind(id)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE transactions
             SET status = 'error', submission_status = 'failed',
                 queue = NULL, queued_at = NULL, status_message = $2
             WHERE id = $1",
        )
        .bind(id)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Spec §4.7: a previously attached envelope/transaction id becomes
    /// stale once a trustline check or re-submission invalidates it.
    pub async fn strip_stale_create_account_envelope(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE transactions SET envelope_xdr = NULL, stellar_transaction_id = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn mark_completed(
        &self,
        id: Uuid,
        stellar_transaction_id: &str,
        paging_token: &str,
        claimable_balance_id: Option<&str>,
        amount_out: &BigDecimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE transactions
             SET status = 'completed', submission_status = 'completed',
                 stellar_transaction_id = $2, paging_token = $3,
                 claimable_balance_id = $4, amount_out = $5,
                 completed_at = $6, queue = NULL, queued_at = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(stellar_transaction_id)
        .bind(paging_token)
        .bind(claimable_balance_id)
        .bind(amount_out)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SubmitterStore for TransactionRepository {
    async fn get(&self, id: Uuid) -> Result<DepositTransaction, RepositoryError> {
        TransactionRepository::get(self, id).await
    }

    async fn mark_processing(&self, id: Uuid) -> Result<(), RepositoryError> {
        TransactionRepository::mark_processing(self, id).await
    }

    async fn mark_retry_pending(&self, id: Uuid) -> Result<(), RepositoryError> {
        TransactionRepository::mark_retry_pending(self, id).await
    }

    async fn mark_blocked(&self, id: Uuid, message: &str) -> Result<(), RepositoryError> {
        TransactionRepository::mark_blocked(self, id, message).await
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), RepositoryError> {
        TransactionRepository::mark_failed(self, id, message).await
    }

    async fn mark_pending_trust(&self, id: Uuid, clear_stale_envelope: bool) -> Result<(), RepositoryError> {
        TransactionRepository::mark_pending_trust(self, id, clear_stale_envelope).await
    }

    async fn strip_stale_create_account_envelope(&self, id: Uuid) -> Result<(), RepositoryError> {
        TransactionRepository::strip_stale_create_account_envelope(self, id).await
    }

    async fn mark_ready_for_submission(&self, id: Uuid) -> Result<(), RepositoryError> {
        TransactionRepository::mark_ready_for_submission(self, id).await
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        stellar_transaction_id: &str,
        paging_token: &str,
        claimable_balance_id: Option<&str>,
        amount_out: &BigDecimal,
    ) -> Result<(), RepositoryError> {
        TransactionRepository::mark_completed(
            self,
            id,
            stellar_transaction_id,
            paging_token,
            claimable_balance_id,
            amount_out,
        )
        .await
    }
}
