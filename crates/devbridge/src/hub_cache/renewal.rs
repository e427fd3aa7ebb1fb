//! Working set of devices whose cache rows should be renewed.

use std::collections::HashSet;

use tokio::sync::{Mutex, Notify};

/// De-duplicating set of pending renewals.
///
/// Reaching the threshold wakes whoever waits in [`RenewalQueue::filled`],
/// so a busy cache flushes before its interval elapses.
pub struct RenewalQueue {
    pending: Mutex<HashSet<String>>,
    threshold: usize,
    filled: Notify,
}

impl RenewalQueue {
    pub fn new(threshold: usize) -> Self {
        Self {
            pending: Mutex::new(HashSet::new()),
            threshold: threshold.max(1),
            filled: Notify::new(),
        }
    }

    /// Add a device to the working set.
    pub async fn schedule(&self, device_id: &str) {
        let len = {
            let mut pending = self.pending.lock().await;
            pending.insert(device_id.to_string());
            pending.len()
        };
        if len >= self.threshold {
            self.filled.notify_one();
        }
    }

    /// Remove and return everything pending.
    pub async fn take(&self) -> Vec<String> {
        let mut pending = self.pending.lock().await;
        std::mem::take(&mut *pending).into_iter().collect()
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Resolves once the set has reached the threshold since the last wake.
    pub async fn filled(&self) {
        self.filled.notified().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn schedule_deduplicates() {
        let queue = RenewalQueue::new(10);
        queue.schedule("a").await;
        queue.schedule("a").await;
        queue.schedule("b").await;

        assert_eq!(queue.len().await, 2);

        let mut taken = queue.take().await;
        taken.sort();
        assert_eq!(taken, vec!["a", "b"]);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn threshold_wakes_waiter() {
        let queue = RenewalQueue::new(2);
        queue.schedule("a").await;
        queue.schedule("b").await;

        // The permit is stored even though nobody was waiting yet.
        tokio::time::timeout(Duration::from_secs(1), queue.filled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn below_threshold_does_not_wake() {
        let queue = RenewalQueue::new(3);
        queue.schedule("a").await;

        let woke = tokio::time::timeout(Duration::from_millis(50), queue.filled()).await;
        assert!(woke.is_err());
    }
}
