//! Transaction envelope construction, signing, and result parsing.
//!
//! Grounded in `custody.py`'s `SelfCustodyIntegration` (`TransactionBuilder`
//! + `append_create_account_op`/payment op + sign), re-expressed over
//! `stellar-xdr` types directly rather than an unverified community SDK.
//! `extract_claimable_balance_id` mirrors `process_pending_deposits.py`'s
//! `get_balance_id`, which parses `result_xdr` rather than the
//! operation-indexed lookup the source also contains (design note §9,
//! DESIGN.md "claimable balance id" open-question decision).

use base64::Engine;
use ed25519_dalek::{Signer as _, SigningKey};
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    AccountId, Asset as XdrAsset, AlphaNum4, AlphaNum12, Claimant, ClaimantV0, ClaimPredicate,
    CreateAccountOp, CreateClaimableBalanceOp, DecoratedSignature, Memo, MuxedAccount,
    Operation, OperationBody, OperationResult, OperationResultTr, PaymentOp, Preconditions,
    PublicKey, ReadXdr, Signature, SignatureHint, SequenceNumber, Transaction, TransactionEnvelope,
    TransactionExt, TransactionResult, TransactionResultResult, TransactionV1Envelope, Uint256,
    VecM, WriteXdr, CreateClaimableBalanceResult, ClaimableBalanceId,
};

use crate::error::StellarError;
use crate::models::Asset as DomainAsset;

const ENVELOPE_TYPE_TX: i32 = 2;

fn account_id_from_strkey(address: &str) -> Result<AccountId, StellarError> {
    let key = stellar_strkey::ed25519::PublicKey::from_string(address)
        .map_err(|_| StellarError::InvalidAddress(address.to_string()))?;
    Ok(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key.0))))
}

fn muxed_account_from_strkey(address: &str) -> Result<MuxedAccount, StellarError> {
    if address.starts_with('M') {
        let muxed = stellar_strkey::Strkey::from_string(address)
            .map_err(|_| StellarError::InvalidAddress(address.to_string()))?;
        match muxed {
            stellar_strkey::Strkey::MuxedAccount(m) => Ok(MuxedAccount::MuxedEd25519(
                stellar_xdr::curr::MuxedAccountMed25519 {
                    id: m.id,
                    ed25519: Uint256(m.ed25519),
                },
            )),
            _ => Err(StellarError::InvalidAddress(address.to_string())),
        }
    } else {
        let key = stellar_strkey::ed25519::PublicKey::from_string(address)
            .map_err(|_| StellarError::InvalidAddress(address.to_string()))?;
        Ok(MuxedAccount::Ed25519(Uint256(key.0)))
    }
}

fn xdr_asset(asset: &DomainAsset) -> Result<XdrAsset, StellarError> {
    let issuer = account_id_from_strkey(&asset.issuer)?;
    let code = asset.code.as_bytes();
    if code.len() <= 4 {
        let mut padded = [0u8; 4];
        padded[..code.len()].copy_from_slice(code);
        Ok(XdrAsset::CreditAlphanum4(AlphaNum4 {
            asset_code: stellar_xdr::curr::AssetCode4(padded),
            issuer,
        }))
    } else {
        let mut padded = [0u8; 12];
        padded[..code.len()].copy_from_slice(code);
        Ok(XdrAsset::CreditAlphanum12(AlphaNum12 {
            asset_code: stellar_xdr::curr::AssetCode12(padded),
            issuer,
        }))
    }
}

/// Amounts are always in Stellar's 7-decimal fixed point stroop
/// representation.
fn to_stroops(amount: &bigdecimal::BigDecimal) -> i64 {
    let scaled = amount * bigdecimal::BigDecimal::from(10_000_000u64);
    scaled.to_string().split('.').next().unwrap_or("0").parse().unwrap_or(0)
}

pub struct UnsignedTransaction {
    pub source_account: String,
    pub sequence: i64,
    pub operations: Vec<Operation>,
    pub memo: Memo,
}

fn build_transaction(unsigned: &UnsignedTransaction) -> Result<Transaction, StellarError> {
    Ok(Transaction {
        source_account: muxed_account_from_strkey(&unsigned.source_account)?,
        fee: 100 * unsigned.operations.len().max(1) as u32,
        seq_num: SequenceNumber(unsigned.sequence),
        cond: Preconditions::None,
        memo: unsigned.memo.clone(),
        operations: unsigned
            .operations
            .clone()
            .try_into()
            .map_err(|_| StellarError::XdrDecode("too many operations".into()))?,
        ext: TransactionExt::V0,
    })
}

fn signature_base(network_id: &[u8; 32], tx: &Transaction) -> Result<Vec<u8>, StellarError> {
    let mut buf = Vec::new();
    buf.extend_from_slice(network_id);
    buf.extend_from_slice(&ENVELOPE_TYPE_TX.to_be_bytes());
    let tx_xdr = tx
        .to_xdr(stellar_xdr::curr::Limits::none())
        .map_err(|e| StellarError::XdrDecode(e.to_string()))?;
    buf.extend_from_slice(&tx_xdr);
    Ok(buf)
}

/// Build and sign a transaction envelope with a single signer, the shape
/// `SelfCustodyIntegration` uses when it doesn't need a channel account.
pub fn build_and_sign(
    unsigned: UnsignedTransaction,
    network_id: &[u8; 32],
    signing_key: &SigningKey,
) -> Result<String, StellarError> {
    let tx = build_transaction(&unsigned)?;
    let base = signature_base(network_id, &tx)?;
    let digest: [u8; 32] = Sha256::digest(&base).into();
    let signature = signing_key.sign(&digest);

    let verifying_key = signing_key.verifying_key();
    let hint_bytes = &verifying_key.to_bytes()[28..32];
    let mut hint = [0u8; 4];
    hint.copy_from_slice(hint_bytes);

    let decorated = DecoratedSignature {
        hint: SignatureHint(hint),
        signature: Signature(
            signature
                .to_bytes()
                .to_vec()
                .try_into()
                .map_err(|_| StellarError::XdrDecode("signature length".into()))?,
        ),
    };

    let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: VecM::try_from(vec![decorated])
            .map_err(|_| StellarError::XdrDecode("too many signatures".into()))?,
    });

    let bytes = envelope
        .to_xdr(stellar_xdr::curr::Limits::none())
        .map_err(|e| StellarError::XdrDecode(e.to_string()))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

pub fn create_account_operation(
    destination: &str,
    starting_balance: &bigdecimal::BigDecimal,
) -> Result<Operation, StellarError> {
    Ok(Operation {
        source_account: None,
        body: OperationBody::CreateAccount(CreateAccountOp {
            destination: account_id_from_strkey(destination)?,
            starting_balance: to_stroops(starting_balance),
        }),
    })
}

pub fn payment_operation(
    destination: &str,
    asset: &DomainAsset,
    amount: &bigdecimal::BigDecimal,
) -> Result<Operation, StellarError> {
    Ok(Operation {
        source_account: None,
        body: OperationBody::Payment(PaymentOp {
            destination: muxed_account_from_strkey(destination)?,
            asset: xdr_asset(asset)?,
            amount: to_stroops(amount),
        }),
    })
}

pub fn create_claimable_balance_operation(
    destination_base_account: &str,
    asset: &DomainAsset,
    amount: &bigdecimal::BigDecimal,
) -> Result<Operation, StellarError> {
    let claimant = Claimant::ClaimantTypeV0(ClaimantV0 {
        destination: account_id_from_strkey(destination_base_account)?,
        predicate: ClaimPredicate::Unconditional,
    });
    Ok(Operation {
        source_account: None,
        body: OperationBody::CreateClaimableBalance(CreateClaimableBalanceOp {
            asset: xdr_asset(asset)?,
            amount: to_stroops(amount),
            claimants: VecM::try_from(vec![claimant])
                .map_err(|_| StellarError::XdrDecode("claimants".into()))?,
        }),
    })
}

/// Parse `result_xdr` looking for a `CreateClaimableBalance` operation
/// result and hex-encode its balance id, mirroring
/// `process_pending_deposits.py`'s `get_balance_id`.
pub fn extract_claimable_balance_id(result_xdr_base64: &str) -> Result<Option<String>, StellarError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(result_xdr_base64)
        .map_err(|e| StellarError::XdrDecode(e.to_string()))?;
    let result = TransactionResult::from_xdr(&bytes, stellar_xdr::curr::Limits::none())
        .map_err(|e| StellarError::XdrDecode(e.to_string()))?;

    let op_results = match result.result {
        TransactionResultResult::TxSuccess(results) => results,
        _ => return Ok(None),
    };

    for op_result in op_results.iter() {
        if let OperationResult::OpInner(OperationResultTr::CreateClaimableBalance(
            CreateClaimableBalanceResult::Success(balance_id),
        )) = op_result
        {
            return Ok(Some(encode_balance_id(balance_id)));
        }
    }
    Ok(None)
}

fn encode_balance_id(id: &ClaimableBalanceId) -> String {
    let bytes = id
        .to_xdr(stellar_xdr::curr::Limits::none())
        .unwrap_or_default();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    #[test]
    fn stroop_conversion_matches_seven_decimals() {
        let amount = BigDecimal::from_str("10.5").unwrap();
        assert_eq!(to_stroops(&amount), 105_000_000);
    }

    #[test]
    fn account_id_roundtrips_for_a_wellformed_g_address() {
        let addr = "GBRPYHIL2CI3FNQ4BXLFMNDLFJUNPU2HY3ZMFSHONUCEOASW7QC7OX2H";
        assert!(account_id_from_strkey(addr).is_ok());
    }
}
