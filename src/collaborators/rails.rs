//! The off-chain rails collaborator (spec §4.4, §6.3).
//!
//! `poll_pending_deposits` is the sole entry point, called only from the
//! rails poller task. The typed `FundedDeposit` DTO replaces the
//! original's dynamic per-object attribute hydration (design note §9):
//! rails hands back only the fields it is authoritative over, and the
//! poller re-reads the row from the repository before validating and
//! transitioning it, rather than trusting a partially-populated object.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use uuid::Uuid;

/// What rails is authoritative over once it reports a deposit funded:
/// the confirmed inbound amount, and — for quoted rows only — the
/// pre-priced fee and payout amount.
#[derive(Debug, Clone)]
pub struct FundedDeposit {
    pub transaction_id: Uuid,
    pub amount_in: BigDecimal,
    pub amount_fee: Option<BigDecimal>,
    pub amount_out: Option<BigDecimal>,
}

#[async_trait]
pub trait Rails: Send + Sync {
    /// Given candidate rows still waiting on off-chain confirmation,
    /// return the subset that has now been funded.
    async fn poll_pending_deposits(&self, candidate_ids: &[Uuid]) -> anyhow::Result<Vec<FundedDeposit>>;
}

/// The rails integration is entirely anchor-specific (bank transfer
/// confirmation, card settlement, whatever off-chain system the anchor
/// runs); the daemon has no default worth shipping. This stub reports
/// nothing funded, which keeps every row parked rather than erroring the
/// poller cycle.
pub struct UnimplementedRails;

#[async_trait]
impl Rails for UnimplementedRails {
    async fn poll_pending_deposits(&self, _candidate_ids: &[Uuid]) -> anyhow::Result<Vec<FundedDeposit>> {
        Ok(Vec::new())
    }
}
