//! Fee function collaborator (spec §6.3): `fee_params -> Decimal` for
//! non-quoted rows missing `amount_fee`. An error from the function is
//! treated as a zero fee, matching the source's `ValueError -> 0`
//! fallback.

use bigdecimal::BigDecimal;

use crate::models::DepositTransaction;

pub trait FeeFunction: Send + Sync {
    fn calculate_fee(&self, transaction: &DepositTransaction) -> anyhow::Result<BigDecimal>;
}

/// The default when no anchor-specific fee function is registered: zero
/// fee, same as the fallback the spec prescribes for a failing function.
pub struct ZeroFee;

impl FeeFunction for ZeroFee {
    fn calculate_fee(&self, _transaction: &DepositTransaction) -> anyhow::Result<BigDecimal> {
        Ok(BigDecimal::from(0))
    }
}

/// Resolve a fee for a non-quoted row missing `amount_fee`: invoke the
/// registered function, falling back to zero on any error (spec §4.4
/// step 3).
pub fn resolve_missing_fee(
    fee_fn: &dyn FeeFunction,
    transaction: &DepositTransaction,
) -> BigDecimal {
    fee_fn
        .calculate_fee(transaction)
        .unwrap_or_else(|_| BigDecimal::from(0))
}
