//! The deposit transaction state machine (spec §4.9): the composite of
//! `status` (user-visible) and `submission_status` (processor-internal).
//!
//! Modeled on `OfframpState::can_transition_to` in the teacher's worker:
//! an enum with a validation method expressing the allowed DAG rather
//! than letting callers write to the columns freely.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    PendingUserTransferStart,
    PendingExternal,
    PendingUser,
    PendingAnchor,
    PendingTrust,
    Error,
    Completed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::PendingUserTransferStart => "pending_user_transfer_start",
            Status::PendingExternal => "pending_external",
            Status::PendingUser => "pending_user",
            Status::PendingAnchor => "pending_anchor",
            Status::PendingTrust => "pending_trust",
            Status::Error => "error",
            Status::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    PendingFunding,
    Ready,
    Processing,
    Pending,
    PendingTrust,
    Blocked,
    Unblocked,
    Failed,
    Completed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::PendingFunding => "pending_funding",
            SubmissionStatus::Ready => "ready",
            SubmissionStatus::Processing => "processing",
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::PendingTrust => "pending_trust",
            SubmissionStatus::Blocked => "blocked",
            SubmissionStatus::Unblocked => "unblocked",
            SubmissionStatus::Failed => "failed",
            SubmissionStatus::Completed => "completed",
        }
    }
}

/// A composite snapshot of the two columns, used to validate transitions
/// as a single atomic move rather than two independently-checked writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub status: Status,
    pub submission_status: Option<SubmissionStatus>,
}

impl Phase {
    pub const fn new(status: Status, submission_status: Option<SubmissionStatus>) -> Self {
        Self {
            status,
            submission_status,
        }
    }

    /// Whether the spec's §4.9 DAG permits moving from `self` to `next`.
    /// Loops exist only at `ready ⇄ processing ⇄ pending` (retry) and
    /// `pending_trust → ready`.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        use Status::*;
        use SubmissionStatus::*;

        if *self == next {
            return true;
        }

        match (self.status, self.submission_status, next.status, next.submission_status) {
            // Terminal states: no transitions out (invariant 8.1.4).
            (Completed, _, _, _) => false,
            (Error, _, _, _) => false,

            // Initial states feed into pending_user (no-account-creation
            // custody) or directly into the submission pipeline.
            (PendingUserTransferStart | PendingExternal, _, PendingUser, Some(PendingFunding)) => true,
            (PendingUserTransferStart | PendingExternal, _, PendingAnchor, Some(Ready)) => true,
            (PendingUserTransferStart | PendingExternal, _, PendingTrust, Some(PendingTrust)) => true,
            (PendingUserTransferStart | PendingExternal, _, Error, Some(Failed)) => true,

            // Funded externally, now ready.
            (PendingUser, Some(PendingFunding), PendingAnchor, Some(Ready)) => true,
            (PendingUser, Some(PendingFunding), PendingTrust, Some(PendingTrust)) => true,

            // Trustline acquired.
            (PendingTrust, Some(PendingTrust), PendingAnchor, Some(Ready)) => true,

            // Submitter retry loop.
            (PendingAnchor, Some(Ready), PendingAnchor, Some(Processing)) => true,
            (PendingAnchor, Some(Processing), PendingAnchor, Some(Pending)) => true,
            (PendingAnchor, Some(Pending), PendingAnchor, Some(Processing)) => true,
            (PendingAnchor, Some(Processing), PendingAnchor, Some(Blocked)) => true,
            (PendingAnchor, Some(Processing), PendingTrust, Some(PendingTrust)) => true,
            (PendingAnchor, Some(Processing), PendingAnchor, Some(Ready)) => true,
            (PendingAnchor, Some(Blocked), PendingAnchor, Some(Unblocked)) => true,
            (PendingAnchor, Some(Unblocked), PendingAnchor, Some(Ready)) => true,

            // Terminal outcomes from the submission pipeline.
            (PendingAnchor, _, Error, Some(Failed)) => true,
            (PendingAnchor, _, Completed, Some(Completed)) => true,

            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_processing_pending_retry_loop_is_allowed() {
        let ready = Phase::new(Status::PendingAnchor, Some(SubmissionStatus::Ready));
        let processing = Phase::new(Status::PendingAnchor, Some(SubmissionStatus::Processing));
        let pending = Phase::new(Status::PendingAnchor, Some(SubmissionStatus::Pending));

        assert!(ready.can_transition_to(processing));
        assert!(processing.can_transition_to(pending));
        assert!(pending.can_transition_to(processing));
    }

    #[test]
    fn pending_trust_to_ready_is_allowed() {
        let pending_trust = Phase::new(Status::PendingTrust, Some(SubmissionStatus::PendingTrust));
        let ready = Phase::new(Status::PendingAnchor, Some(SubmissionStatus::Ready));
        assert!(pending_trust.can_transition_to(ready));
    }

    #[test]
    fn completed_is_terminal() {
        let completed = Phase::new(Status::Completed, Some(SubmissionStatus::Completed));
        let ready = Phase::new(Status::PendingAnchor, Some(SubmissionStatus::Ready));
        assert!(!completed.can_transition_to(ready));
    }

    #[test]
    fn error_is_terminal() {
        let error = Phase::new(Status::Error, Some(SubmissionStatus::Failed));
        let ready = Phase::new(Status::PendingAnchor, Some(SubmissionStatus::Ready));
        assert!(!error.can_transition_to(ready));
    }

    #[test]
    fn blocked_requires_operator_unblock_before_requeue() {
        let blocked = Phase::new(Status::PendingAnchor, Some(SubmissionStatus::Blocked));
        let ready = Phase::new(Status::PendingAnchor, Some(SubmissionStatus::Ready));
        assert!(!blocked.can_transition_to(ready));

        let unblocked = Phase::new(Status::PendingAnchor, Some(SubmissionStatus::Unblocked));
        assert!(blocked.can_transition_to(unblocked));
        assert!(unblocked.can_transition_to(ready));
    }

    #[test]
    fn arbitrary_skips_are_rejected() {
        let initial = Phase::new(Status::PendingUserTransferStart, None);
        let completed = Phase::new(Status::Completed, Some(SubmissionStatus::Completed));
        assert!(!initial.can_transition_to(completed));
    }
}
