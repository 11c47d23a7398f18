//! The in-memory submission queue (spec §3.4, §4.3).
//!
//! A FIFO of transaction ids whose processing readiness has been
//! confirmed. Producers are the account checker, the trustline checker,
//! the scavenger, and the submitter itself (on the create-account-then-
//! deposit split); the sole consumer is the submitter.
//!
//! On startup the queue is rehydrated from the store by scanning rows
//! with `queue = SUBMIT_TRANSACTION_QUEUE` and `submission_status IN
//! (ready, processing)` and a supported `kind`, ordered by ascending
//! `queued_at`, which preserves fairness across restarts.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

pub const SUBMIT_TRANSACTION_QUEUE: &str = "submit_transaction";

#[derive(Default)]
pub struct SubmissionQueue {
    items: Mutex<VecDeque<Uuid>>,
    notify: Notify,
}

impl SubmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the queue at startup, in the order callers provide it. Callers
    /// are responsible for ordering by `queued_at` ascending beforehand
    /// (see `TransactionRepository::rehydration_candidates`).
    pub async fn rehydrate(&self, ids: Vec<Uuid>) {
        let mut items = self.items.lock().await;
        for id in ids {
            items.push_back(id);
        }
        if !items.is_empty() {
            self.notify.notify_one();
        }
    }

    pub async fn push(&self, id: Uuid) {
        let mut items = self.items.lock().await;
        items.push_back(id);
        drop(items);
        self.notify.notify_one();
    }

    /// Block until an item is available, then pop and return it.
    pub async fn pop(&self) -> Uuid {
        loop {
            {
                let mut items = self.items.lock().await;
                if let Some(id) = items.pop_front() {
                    return id;
                }
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let queue = SubmissionQueue::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        queue.push(a).await;
        queue.push(b).await;
        queue.push(c).await;

        assert_eq!(queue.pop().await, a);
        assert_eq!(queue.pop().await, b);
        assert_eq!(queue.pop().await, c);
    }

    #[tokio::test]
    async fn rehydrate_preserves_given_order() {
        let queue = SubmissionQueue::new();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        queue.rehydrate(ids.clone()).await;
        for expected in ids {
            assert_eq!(queue.pop().await, expected);
        }
    }

    #[tokio::test]
    async fn pop_blocks_until_an_item_is_pushed() {
        let queue = Arc::new(SubmissionQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let id = Uuid::new_v4();
        queue.push(id).await;

        let popped = tokio::time::timeout(Duration::from_millis(200), consumer)
            .await
            .expect("consumer should resolve after push")
            .expect("task should not panic");
        assert_eq!(popped, id);
    }
}
