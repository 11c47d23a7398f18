//! The post-deposit hook (spec §6.3): `after_deposit(transaction)`,
//! optional, failures logged and non-fatal.

use async_trait::async_trait;

use crate::models::DepositTransaction;

#[async_trait]
pub trait Deposit: Send + Sync {
    /// Called once a transaction reaches `completed`. A `NotImplemented`-
    /// style no-op is a legal response: the default impl below does
    /// nothing and always succeeds.
    async fn after_deposit(&self, transaction: &DepositTransaction) -> anyhow::Result<()>;
}

/// The hook is optional at the protocol level; this is what "no
/// integration wired up" looks like.
pub struct NoopDeposit;

#[async_trait]
impl Deposit for NoopDeposit {
    async fn after_deposit(&self, _transaction: &DepositTransaction) -> anyhow::Result<()> {
        Ok(())
    }
}
