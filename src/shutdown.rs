//! Heartbeat lock (spec §4.1) and signal/shutdown coordinator (spec §4.10).
//!
//! Neither of these has a direct analogue in the original Python
//! management command (it never enforced single-instance exclusion); the
//! heartbeat protocol here is new code grounded only in the spec's own
//! acquire/maintain/release description, implemented as a read-modify-
//! write transaction against the same Postgres pool the rest of the
//! crate uses, following the shape of every other sqlx call in the
//! repository layer.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::HeartbeatError;

fn identity() -> String {
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string());
    format!("{hostname}:{}", std::process::id())
}

/// Acquisition protocol (spec §4.1): open a transaction on the heartbeat
/// row. If absent, insert and acquire. If present and stale (older than
/// `max(5 * heartbeat_interval, 30s)`), take it over. Otherwise this call
/// returns `Contended`, and the caller sleeps `heartbeat_interval` and
/// retries — acquisition itself blocks the whole daemon startup, which is
/// the spec's explicit, non-fatal "lock unobtainable" behavior.
pub async fn try_acquire_heartbeat(pool: &PgPool, config: &Config) -> Result<(), HeartbeatError> {
    let mut tx = pool.begin().await?;
    let locked_by = identity();
    let now = Utc::now();

    let row: Option<(String, chrono::DateTime<Utc>)> = sqlx::query_as(
        "SELECT locked_by, last_heartbeat FROM processor_heartbeat WHERE lock_name = 'pending_deposits' FOR UPDATE",
    )
    .fetch_optional(&mut *tx)
    .await?;

    match row {
        None => {
            sqlx::query(
                "INSERT INTO processor_heartbeat (lock_name, locked_by, last_heartbeat) VALUES ('pending_deposits', $1, $2)",
            )
            .bind(&locked_by)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            info!(locked_by = %locked_by, "heartbeat lock acquired (no prior holder)");
            Ok(())
        }
        Some((prior_holder, last_heartbeat)) => {
            let delta = now.signed_duration_since(last_heartbeat);
            let stale_after = config.heartbeat_stale_after();
            if delta.to_std().unwrap_or_default() > stale_after {
                sqlx::query(
                    "UPDATE processor_heartbeat SET locked_by = $1, last_heartbeat = $2 WHERE lock_name = 'pending_deposits'",
                )
                .bind(&locked_by)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                warn!(
                    prior_holder = %prior_holder,
                    locked_by = %locked_by,
                    "heartbeat lock taken over from stale holder"
                );
                Ok(())
            } else {
                tx.rollback().await?;
                Err(HeartbeatError::Contended)
            }
        }
    }
}

/// Block (sleeping `heartbeat_interval` between attempts) until the lock
/// is acquired.
pub async fn acquire_heartbeat_blocking(pool: &PgPool, config: &Config) {
    loop {
        match try_acquire_heartbeat(pool, config).await {
            Ok(()) => return,
            Err(HeartbeatError::Contended) => {
                tokio::time::sleep(config.heartbeat_interval()).await;
            }
            Err(e) => {
                error!(error = %e, "heartbeat acquisition failed, retrying");
                tokio::time::sleep(config.heartbeat_interval()).await;
            }
        }
    }
}

/// Maintenance task: refresh `last_heartbeat` every `heartbeat_interval`
/// until shutdown is signaled.
pub async fn maintain_heartbeat(pool: PgPool, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_secs(crate::config::HEARTBEAT_INTERVAL_SECS));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = sqlx::query(
                    "UPDATE processor_heartbeat SET last_heartbeat = $1 WHERE lock_name = 'pending_deposits'",
                )
                .bind(Utc::now())
                .execute(&pool)
                .await
                {
                    error!(error = %e, "failed to refresh heartbeat");
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

/// Release (spec §4.1): delete the heartbeat row unconditionally, on
/// graceful shutdown.
pub async fn release_heartbeat(pool: &PgPool) {
    if let Err(e) = sqlx::query("DELETE FROM processor_heartbeat WHERE lock_name = 'pending_deposits'")
        .execute(pool)
        .await
    {
        error!(error = %e, "failed to release heartbeat on shutdown");
    }
}

/// Listens for SIGINT/SIGTERM and broadcasts shutdown to every task
/// holding a clone of the receiver (spec §4.10).
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

pub async fn wait_for_signal(tx: watch::Sender<bool>) {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    let _ = tx.send(true);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_includes_pid() {
        let id = identity();
        assert!(id.contains(&std::process::id().to_string()));
    }
}
