//! On-change webhook callback (spec §6.4): fire-and-forget, failures
//! logged, never retried, never blocking.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeEvent {
    pub transaction_id: uuid::Uuid,
    pub status: String,
    pub submission_status: Option<String>,
    pub status_message: Option<String>,
}

pub struct WebhookNotifier {
    http: Client,
    hmac_secret: Option<String>,
}

impl WebhookNotifier {
    pub fn new(hmac_secret: Option<String>, timeout_secs: u64) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build reqwest client");
        Self { http, hmac_secret }
    }

    /// Attempt one delivery. Never awaited by the caller in a way that
    /// blocks the state transition that triggered it; spawned as its own
    /// task and its result only logged.
    pub async fn notify(&self, url: &str, event: &StatusChangeEvent) {
        let body = match serde_json::to_vec(event) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to serialize webhook payload");
                return;
            }
        };

        let mut request = self.http.post(url).body(body.clone());
        if let Some(secret) = &self.hmac_secret {
            if let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) {
                mac.update(&body);
                let signature = hex::encode(mac.finalize().into_bytes());
                request = request.header("X-Signature", signature);
            }
        }

        if let Err(e) = request.send().await {
            warn!(
                transaction_id = %event.transaction_id,
                error = %e,
                "on-change webhook delivery failed"
            );
        }
    }
}
