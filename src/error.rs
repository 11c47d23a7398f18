//! Crate-wide error types.
//!
//! Each subsystem gets its own `thiserror` enum in the shape the workers
//! already use (`OfframpError`, `ProcessorError`): a handful of named
//! variants, a `Database(#[from] sqlx::Error)` arm, and a blanket
//! `From<anyhow::Error>` escape hatch for anything that doesn't deserve
//! its own variant.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("transaction {id} not found")]
    NotFound { id: uuid::Uuid },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum StellarError {
    #[error("network error contacting horizon: {0}")]
    Network(#[from] reqwest::Error),

    #[error("account not found")]
    AccountNotFound,

    #[error("horizon returned an error response: {status} {body}")]
    HorizonError { status: u16, body: String },

    #[error("invalid stellar address: {0}")]
    InvalidAddress(String),

    #[error("failed to decode xdr: {0}")]
    XdrDecode(String),
}

/// The sum type replacing exceptions-as-control-flow for Custody's
/// submission outcome (design note: `SubmissionOutcome`).
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// Custody reports the submission is transiently pending; retry in-loop.
    Pending,
    /// Custody reports a non-transient block; awaits operator intervention.
    Blocked { reason: String },
    /// Custody reports a terminal failure.
    Failed { reason: String },
    /// Submission succeeded; the Stellar transaction hash.
    Ok { hash: String },
}

#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("custody reported a transient pending state")]
    Pending,

    #[error("custody reported a blocked submission: {0}")]
    Blocked(String),

    #[error("custody reported a failed submission: {0}")]
    Failed(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CustodyError {
    pub fn into_outcome(self) -> SubmissionOutcome {
        match self {
            CustodyError::Pending => SubmissionOutcome::Pending,
            CustodyError::Blocked(reason) => SubmissionOutcome::Blocked { reason },
            CustodyError::Failed(reason) => SubmissionOutcome::Failed { reason },
            CustodyError::Other(e) => SubmissionOutcome::Failed {
                reason: format!("{e}"),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("stellar error: {0}")]
    Stellar(#[from] StellarError),

    #[error("custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("transaction {id} is in a non-submittable state: {status:?}/{submission_status:?}")]
    InvalidState {
        id: uuid::Uuid,
        status: String,
        submission_status: String,
    },
}

#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("heartbeat is held by another instance, retry later")]
    Contended,
}
