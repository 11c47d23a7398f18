//! Network identity used when signing transactions: the Horizon URL plus
//! the network passphrase, whose SHA-256 hash is the `network_id` XDR
//! signs are computed over.

use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub horizon_url: String,
    pub passphrase: String,
}

impl NetworkConfig {
    pub fn network_id(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.passphrase.as_bytes());
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_id_is_deterministic() {
        let cfg = NetworkConfig {
            horizon_url: "https://horizon-testnet.stellar.org".into(),
            passphrase: "Test SDF Network ; September 2015".into(),
        };
        assert_eq!(cfg.network_id(), cfg.network_id());
    }
}
