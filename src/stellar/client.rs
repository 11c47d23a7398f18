//! A thin Horizon HTTP client.
//!
//! Built directly over `reqwest` rather than a community Stellar SDK
//! crate, with wrapper methods shaped after `stellar_main.rs`'s own
//! `StellarClient` (`account_exists`, `get_account`, `health_check`),
//! generalized to the submission/confirmation surface the workers need.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::StellarError;
use crate::stellar::config::NetworkConfig;
use crate::stellar::types::{AccountResponse, HealthCheck, TransactionResponse};

/// The Horizon surface the submitter depends on (spec §4.8). Exists so
/// tests can drive the submission attempt loop against a mock instead of
/// a live Horizon, the way `Custody` is already mockable.
#[async_trait]
pub trait Horizon: Send + Sync {
    async fn get_account(&self, account_id: &str) -> Result<AccountResponse, StellarError>;
    async fn get_transaction(&self, hash: &str) -> Result<TransactionResponse, StellarError>;
}

#[derive(Clone)]
pub struct StellarClient {
    http: Client,
    pub network: NetworkConfig,
}

impl StellarClient {
    pub fn new(network: NetworkConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");
        Self { http, network }
    }

    pub async fn health_check(&self) -> HealthCheck {
        let start = Instant::now();
        match self.http.get(&self.network.horizon_url).send().await {
            Ok(resp) => HealthCheck {
                is_healthy: resp.status().is_success(),
                response_time_ms: start.elapsed().as_millis(),
                error_message: None,
            },
            Err(e) => HealthCheck {
                is_healthy: false,
                response_time_ms: start.elapsed().as_millis(),
                error_message: Some(e.to_string()),
            },
        }
    }

    pub async fn account_exists(&self, account_id: &str) -> Result<bool, StellarError> {
        match self.get_account(account_id).await {
            Ok(_) => Ok(true),
            Err(StellarError::AccountNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn get_account(&self, account_id: &str) -> Result<AccountResponse, StellarError> {
        let url = format!("{}/accounts/{}", self.network.horizon_url, account_id);
        let resp = self.http.get(&url).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StellarError::AccountNotFound);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StellarError::HorizonError { status, body });
        }

        resp.json::<AccountResponse>()
            .await
            .map_err(StellarError::Network)
    }

    pub async fn get_transaction(&self, hash: &str) -> Result<TransactionResponse, StellarError> {
        let url = format!("{}/transactions/{}", self.network.horizon_url, hash);
        let resp = self.http.get(&url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StellarError::HorizonError { status, body });
        }

        resp.json::<TransactionResponse>()
            .await
            .map_err(StellarError::Network)
    }

    /// Submit a base64-encoded signed transaction envelope. Horizon
    /// returns 200 with `successful: false` for on-chain failures
    /// (handled by the caller, spec §4.8 step 6), and a non-2xx status
    /// for request-level rejections.
    pub async fn submit_transaction(
        &self,
        envelope_xdr_base64: &str,
    ) -> Result<TransactionResponse, StellarError> {
        let url = format!("{}/transactions", self.network.horizon_url);
        debug!(url = %url, "submitting transaction to horizon");

        let resp = self
            .http
            .post(&url)
            .form(&[("tx", envelope_xdr_base64)])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StellarError::HorizonError { status, body });
        }

        resp.json::<TransactionResponse>()
            .await
            .map_err(StellarError::Network)
    }
}

#[async_trait]
impl Horizon for StellarClient {
    async fn get_account(&self, account_id: &str) -> Result<AccountResponse, StellarError> {
        StellarClient::get_account(self, account_id).await
    }

    async fn get_transaction(&self, hash: &str) -> Result<TransactionResponse, StellarError> {
        StellarClient::get_transaction(self, hash).await
    }
}
