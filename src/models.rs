//! The central entity (spec §3.1) and its immediate dependencies.
//!
//! Cyclic references between a transaction and its asset (design note
//! §9) are broken by holding an `Asset` value inline rather than a
//! foreign-key relation object; the repository resolves ids at each task
//! step instead of the row carrying live references across await points.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::{Status, SubmissionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    Deposit,
    DepositExchange,
}

impl TransactionKind {
    pub fn is_supported(&self) -> bool {
        matches!(self, TransactionKind::Deposit | TransactionKind::DepositExchange)
    }
}

/// Reference to the issued Stellar asset a deposit pays out in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Asset {
    pub code: String,
    pub issuer: String,
    pub significant_decimals: i32,
    pub distribution_account: String,
}

impl Asset {
    pub fn round(&self, amount: &BigDecimal) -> BigDecimal {
        amount.with_scale(self.significant_decimals as i64)
    }
}

/// Optional priced exchange quote. If present, `amount_out`/`amount_fee`
/// on the transaction must already be populated by rails before the
/// transaction enters the submission pipeline (invariant §3.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: Uuid,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DepositTransaction {
    pub id: Uuid,
    pub kind: TransactionKind,

    #[sqlx(flatten)]
    pub asset: Asset,

    pub quote_id: Option<Uuid>,

    pub to_address: String,
    pub amount_in: Option<BigDecimal>,
    pub amount_fee: Option<BigDecimal>,
    pub amount_out: Option<BigDecimal>,

    pub status: Status,
    pub submission_status: Option<SubmissionStatus>,

    pub pending_signatures: bool,
    pub envelope_xdr: Option<String>,

    pub claimable_balance_supported: bool,
    pub claimable_balance_id: Option<String>,

    pub stellar_transaction_id: Option<String>,
    pub paging_token: Option<String>,

    pub queue: Option<String>,
    pub queued_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,
    pub status_message: Option<String>,

    /// Anchor-assigned memo to attach to the payment operation
    /// (supplement, from original_source `models.py`).
    pub memo: Option<String>,
    pub memo_type: Option<String>,

    /// Identifiers only; the processor never resolves these to a secret.
    /// Custody resolves them internally if a channel-account flow is in
    /// play (supplement, from original_source `models.py`).
    pub channel_account: Option<String>,

    /// Per-transaction on-change callback target (spec §6.4). `None`
    /// means the API writer never registered one; the submitter then
    /// skips the notify step entirely.
    pub webhook_url: Option<String>,
}

impl DepositTransaction {
    pub fn is_quoted(&self) -> bool {
        self.quote_id.is_some()
    }

    /// Spec §4.8 step 6: `amount_out` is the row's pre-priced quote amount
    /// for quoted rows, and `amount_in - amount_fee` rounded to the
    /// asset's significant decimals otherwise.
    pub fn completed_amount_out(&self) -> BigDecimal {
        if self.is_quoted() {
            self.amount_out.clone().unwrap_or_else(|| BigDecimal::from(0))
        } else {
            let amount_in = self.amount_in.clone().unwrap_or_else(|| BigDecimal::from(0));
            let amount_fee = self.amount_fee.clone().unwrap_or_else(|| BigDecimal::from(0));
            self.asset.round(&(amount_in - amount_fee))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn base() -> DepositTransaction {
        DepositTransaction {
            id: Uuid::new_v4(),
            kind: TransactionKind::Deposit,
            asset: Asset {
                code: "USD".into(),
                issuer: "GISSUER".into(),
                significant_decimals: 2,
                distribution_account: "GDIST".into(),
            },
            quote_id: None,
            to_address: "GDEST".into(),
            amount_in: Some(BigDecimal::from_str("10.50").unwrap()),
            amount_fee: Some(BigDecimal::from_str("1").unwrap()),
            amount_out: None,
            status: Status::PendingUserTransferStart,
            submission_status: None,
            pending_signatures: false,
            envelope_xdr: None,
            claimable_balance_supported: false,
            claimable_balance_id: None,
            stellar_transaction_id: None,
            paging_token: None,
            queue: None,
            queued_at: None,
            completed_at: None,
            status_message: None,
            memo: None,
            memo_type: None,
            channel_account: None,
            webhook_url: None,
        }
    }

    #[test]
    fn non_quoted_amount_out_is_in_minus_fee_rounded() {
        let tx = base();
        assert_eq!(tx.completed_amount_out(), BigDecimal::from_str("9.50").unwrap());
    }

    #[test]
    fn quoted_amount_out_uses_the_pre_priced_value_verbatim() {
        let mut tx = base();
        tx.quote_id = Some(Uuid::new_v4());
        tx.amount_out = Some(BigDecimal::from_str("42.10").unwrap());
        assert_eq!(tx.completed_amount_out(), BigDecimal::from_str("42.10").unwrap());
    }
}
