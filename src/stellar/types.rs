//! Horizon JSON response shapes and the multiplexed-address helpers the
//! rest of the crate needs.
//!
//! Grounded on the field names `stellar_main.rs`'s `StellarClient`
//! wrapper returns (`account_id`, `sequence`, `balances`), generalized
//! to the full set of response fields the processor's workers read.

use serde::{Deserialize, Serialize};

use crate::error::StellarError;

#[derive(Debug, Clone, Deserialize)]
pub struct Balance {
    pub balance: String,
    pub asset_type: String,
    #[serde(default)]
    pub asset_code: Option<String>,
    #[serde(default)]
    pub asset_issuer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signer {
    pub key: String,
    pub weight: u32,
    #[serde(rename = "type")]
    pub signer_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    pub low_threshold: u32,
    pub med_threshold: u32,
    pub high_threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub account_id: String,
    pub sequence: String,
    pub balances: Vec<Balance>,
    #[serde(default)]
    pub signers: Vec<Signer>,
    pub thresholds: Thresholds,
}

impl AccountResponse {
    /// Whether this account carries a trustline to the given asset.
    pub fn has_trustline(&self, asset_code: &str, asset_issuer: &str) -> bool {
        self.balances.iter().any(|b| {
            b.asset_code.as_deref() == Some(asset_code) && b.asset_issuer.as_deref() == Some(asset_issuer)
        })
    }

    pub fn next_sequence(&self) -> Result<i64, StellarError> {
        self.sequence
            .parse::<i64>()
            .map(|n| n + 1)
            .map_err(|_| StellarError::XdrDecode("malformed sequence number".into()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResponse {
    pub hash: String,
    pub successful: bool,
    pub paging_token: String,
    pub result_xdr: String,
    #[serde(default)]
    pub envelope_xdr: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub is_healthy: bool,
    pub response_time_ms: u128,
    pub error_message: Option<String>,
}

/// Resolve a destination address to the base `G...` account it should be
/// checked against for existence/trustlines, while leaving the original
/// address available as the payment destination (spec §8.3).
pub struct ResolvedDestination {
    pub base_account: String,
    pub original_address: String,
    pub is_muxed: bool,
}

pub fn resolve_destination(address: &str) -> Result<ResolvedDestination, StellarError> {
    if address.starts_with('M') {
        let muxed = stellar_strkey::Strkey::from_string(address)
            .map_err(|_| StellarError::InvalidAddress(address.to_string()))?;
        let base_account = match muxed {
            stellar_strkey::Strkey::MuxedAccount(m) => {
                stellar_strkey::ed25519::PublicKey(m.ed25519).to_string()
            }
            _ => return Err(StellarError::InvalidAddress(address.to_string())),
        };
        Ok(ResolvedDestination {
            base_account,
            original_address: address.to_string(),
            is_muxed: true,
        })
    } else {
        // Validate it decodes as a plain account id.
        stellar_strkey::ed25519::PublicKey::from_string(address)
            .map_err(|_| StellarError::InvalidAddress(address.to_string()))?;
        Ok(ResolvedDestination {
            base_account: address.to_string(),
            original_address: address.to_string(),
            is_muxed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_g_address_resolves_to_itself() {
        let addr = "GBRPYHIL2CI3FNQ4BXLFMNDLFJUNPU2HY3ZMFSHONUCEOASW7QC7OX2H";
        let resolved = resolve_destination(addr).expect("should parse a well-formed G address");
        assert_eq!(resolved.base_account, addr);
        assert_eq!(resolved.original_address, addr);
        assert!(!resolved.is_muxed);
    }
}
