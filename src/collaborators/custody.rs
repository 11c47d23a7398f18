//! The Custody collaborator (spec §4.6): holds keys and produces signed
//! Stellar transactions. The processor's own task graph never sees a
//! distribution seed (invariant §8.1.5); only this module, and only in
//! the `SelfCustody` implementation, ever touches one.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use ed25519_dalek::SigningKey;
use stellar_strkey::ed25519::PrivateKey;

use crate::error::{CustodyError, StellarError};
use crate::models::{Asset, DepositTransaction};
use crate::stellar::envelope::{
    build_and_sign, create_account_operation, create_claimable_balance_operation,
    payment_operation, UnsignedTransaction,
};
use crate::stellar::StellarClient;

/// The distribution account a submission is scoped to, or a signal that
/// Custody manages its own internal serialization and the caller should
/// not acquire a source-account lock (spec §4.2, §4.6).
pub enum DistributionAccount {
    Account(String),
    NotSupported,
}

#[async_trait]
pub trait Custody: Send + Sync {
    async fn get_distribution_account(&self, asset: &Asset) -> DistributionAccount;

    /// Build, sign, and submit a `create_account` operation. Returns the
    /// Stellar transaction hash on success.
    async fn create_destination_account(
        &self,
        transaction: &DepositTransaction,
    ) -> Result<String, CustodyError>;

    /// Build, sign, and submit the deposit payment or claimable balance
    /// creation. `has_trustline` decides which operation kind is used
    /// when the client doesn't support claimable balances.
    async fn submit_deposit_transaction(
        &self,
        transaction: &DepositTransaction,
        has_trustline: bool,
    ) -> Result<String, CustodyError>;

    fn account_creation_supported(&self) -> bool;
    fn claimable_balances_supported(&self) -> bool;
}

/// An anchor that self-signs with a held distribution secret, grounded
/// in `polaris/polaris/integrations/custody.py`'s `SelfCustodyIntegration`.
/// A production anchor is expected to supply its own `Custody` backed by
/// an external signing service or channel-account strategy; this exists
/// so the daemon is runnable end-to-end against a test network.
pub struct SelfCustody {
    stellar: StellarClient,
    signing_key: SigningKey,
    account_id: String,
    /// Starting balance (in XLM) for newly created destination accounts.
    starting_balance: BigDecimal,
}

impl SelfCustody {
    pub fn new(stellar: StellarClient, distribution_seed: &str) -> Result<Self, StellarError> {
        let seed = PrivateKey::from_string(distribution_seed)
            .map_err(|_| StellarError::InvalidAddress("malformed distribution seed".into()))?;
        let signing_key = SigningKey::from_bytes(&seed.0);
        let account_id =
            stellar_strkey::ed25519::PublicKey(signing_key.verifying_key().to_bytes()).to_string();

        Ok(Self {
            stellar,
            signing_key,
            account_id,
            starting_balance: BigDecimal::from(2),
        })
    }

    async fn next_sequence(&self) -> Result<i64, CustodyError> {
        let account = self
            .stellar
            .get_account(&self.account_id)
            .await
            .map_err(|e| CustodyError::Other(e.into()))?;
        account.next_sequence().map_err(|e| CustodyError::Other(e.into()))
    }
}

#[async_trait]
impl Custody for SelfCustody {
    async fn get_distribution_account(&self, _asset: &Asset) -> DistributionAccount {
        DistributionAccount::Account(self.account_id.clone())
    }

    async fn create_destination_account(
        &self,
        transaction: &DepositTransaction,
    ) -> Result<String, CustodyError> {
        let sequence = self.next_sequence().await?;
        let op = create_account_operation(&transaction.to_address, &self.starting_balance)
            .map_err(|e| CustodyError::Other(e.into()))?;

        let unsigned = UnsignedTransaction {
            source_account: self.account_id.clone(),
            sequence,
            operations: vec![op],
            memo: stellar_xdr::curr::Memo::None,
        };

        let envelope = build_and_sign(unsigned, &self.stellar.network.network_id(), &self.signing_key)
            .map_err(|e| CustodyError::Other(e.into()))?;

        let response = self
            .stellar
            .submit_transaction(&envelope)
            .await
            .map_err(classify_submit_error)?;

        Ok(response.hash)
    }

    async fn submit_deposit_transaction(
        &self,
        transaction: &DepositTransaction,
        has_trustline: bool,
    ) -> Result<String, CustodyError> {
        if transaction.amount_in.is_none() {
            return Err(CustodyError::Failed("transaction missing amount_in".into()));
        }
        let sequence = self.next_sequence().await?;

        // Spec §4.8 step 6: the on-chain payment amount is the same
        // amount_in - amount_fee (or pre-priced amount_out for quoted
        // rows) that gets recorded on completion.
        let amount = transaction.completed_amount_out();

        let op = if transaction.claimable_balance_supported && !has_trustline {
            create_claimable_balance_operation(&transaction.to_address, &transaction.asset, &amount)
        } else {
            payment_operation(&transaction.to_address, &transaction.asset, &amount)
        }
        .map_err(|e| CustodyError::Other(e.into()))?;

        let memo = match (&transaction.memo, transaction.memo_type.as_deref()) {
            (Some(text), Some("text")) | (Some(text), None) => {
                let bytes = text.as_bytes().to_vec();
                let memo_text = bytes.try_into().map_err(|bytes: Vec<u8>| {
                    CustodyError::Failed(format!(
                        "memo text is {} bytes, exceeds the 28-byte Stellar memo limit",
                        bytes.len()
                    ))
                })?;
                stellar_xdr::curr::Memo::Text(memo_text)
            }
            _ => stellar_xdr::curr::Memo::None,
        };

        let unsigned = UnsignedTransaction {
            source_account: self.account_id.clone(),
            sequence,
            operations: vec![op],
            memo,
        };

        let envelope = build_and_sign(unsigned, &self.stellar.network.network_id(), &self.signing_key)
            .map_err(|e| CustodyError::Other(e.into()))?;

        let response = self
            .stellar
            .submit_transaction(&envelope)
            .await
            .map_err(classify_submit_error)?;

        Ok(response.hash)
    }

    fn account_creation_supported(&self) -> bool {
        true
    }

    fn claimable_balances_supported(&self) -> bool {
        true
    }
}

fn classify_submit_error(e: StellarError) -> CustodyError {
    match &e {
        StellarError::HorizonError { status, .. } if *status == 504 || *status == 429 => {
            CustodyError::Pending
        }
        _ => CustodyError::Other(e.into()),
    }
}
