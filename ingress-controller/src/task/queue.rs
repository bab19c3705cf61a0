//! Work queue feeding the sync workers: FIFO over string keys with
//! deduplication, exponential-backoff requeue, and cooperative shutdown.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(300);

/// A queued key together with the number of failed attempts, used to
/// compute the next backoff delay.
#[derive(Debug)]
pub struct Item {
    pub key: String,
    attempts: u32,
}

struct Inner {
    items: VecDeque<Item>,
    // keys currently queued; a key is in flight at most once
    pending: HashSet<String>,
}

pub struct Queue {
    name: &'static str,
    inner: Mutex<Inner>,
    notify: Notify,
    shutdown: CancellationToken,
}

impl Queue {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                pending: HashSet::new(),
            }),
            notify: Notify::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Queues a key unless it is already pending or the queue is shutting
    /// down.
    pub fn enqueue(&self, key: impl Into<String>) {
        self.push(Item {
            key: key.into(),
            attempts: 0,
        });
    }

    fn push(&self, item: Item) {
        if self.is_shutting_down() {
            debug!(queue = self.name, key = %item.key, "dropping enqueue, queue is shutting down");
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.pending.insert(item.key.clone()) {
            inner.items.push_back(item);
            drop(inner);
            self.notify.notify_one();
        }
    }

    /// Requeues a failed item after an exponential backoff delay.
    pub fn requeue(self: &Arc<Self>, item: Item) {
        let delay = backoff(item.attempts);
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => queue.push(Item {
                    key: item.key,
                    attempts: item.attempts + 1,
                }),
                _ = queue.shutdown.cancelled() => {}
            }
        });
    }

    /// Pops the next item, waiting for one to arrive. Returns `None` once
    /// the queue is shutting down and drained.
    pub async fn next(&self) -> Option<Item> {
        loop {
            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(item) = inner.items.pop_front() {
                    inner.pending.remove(&item.key);
                    return Some(item);
                }
            }
            if self.is_shutting_down() {
                return None;
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = self.shutdown.cancelled() => {}
            }
        }
    }

    /// Stops accepting new work and signals the worker to drain and exit.
    pub fn shutdown(&self) {
        debug!(queue = self.name, "shutting down queue");
        self.shutdown.cancel();
        self.notify.notify_one();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn backoff(attempts: u32) -> Duration {
    let delay = BASE_DELAY * 2u32.saturating_pow(attempts.min(16));
    delay.min(MAX_DELAY)
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn enqueue_deduplicates_pending_keys() {
        let queue = Queue::new("test");
        queue.enqueue("default/foo");
        queue.enqueue("default/foo");
        queue.enqueue("default/bar");
        assert_eq!(queue.len(), 2);

        let first = queue.next().await.unwrap();
        assert_eq!(first.key, "default/foo");
        // popped keys may be queued again
        queue.enqueue("default/foo");
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn next_drains_before_reporting_shutdown() {
        let queue = Queue::new("test");
        queue.enqueue("a");
        queue.shutdown();
        assert!(queue.is_shutting_down());
        assert_eq!(queue.next().await.unwrap().key, "a");
        assert!(queue.next().await.is_none());
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_is_dropped() {
        let queue = Queue::new("test");
        queue.shutdown();
        queue.enqueue("a");
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn requeue_applies_backoff() {
        let queue = Queue::new("test");
        queue.enqueue("a");
        let item = queue.next().await.unwrap();
        queue.requeue(item);
        assert!(queue.is_empty());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let item = queue.next().await.unwrap();
        assert_eq!(item.key, "a");
        assert_eq!(item.attempts, 1);

        // second failure waits twice as long
        queue.requeue(item);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(queue.is_empty());
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff(0), Duration::from_secs(1));
        assert_eq!(backoff(3), Duration::from_secs(8));
        assert_eq!(backoff(30), MAX_DELAY);
    }
}
