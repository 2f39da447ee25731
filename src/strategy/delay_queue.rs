//! # Delay Queue
//!
//! Multi-producer, multi-consumer queue of items tagged with an
//! earliest-delivery time. Items become available for dequeue only once due.
//! The queue deduplicates by item identity: while an identity is scheduled
//! and undelivered, further adds coalesce onto the earlier due time, and
//! while an identity is held between [`get`](DelayQueue::get) and
//! [`done`](DelayQueue::done), adds are parked and re-scheduled when `done`
//! runs. Duplicate adds therefore never multiply deliveries.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Items carry a stable identity the queue deduplicates on.
pub trait Keyed {
    fn key(&self) -> &str;
}

struct Entry<T> {
    due: Instant,
    item: T,
}

struct Inner<T> {
    /// Undelivered items, keyed by identity.
    scheduled: HashMap<String, Entry<T>>,
    /// Identities held by a consumer between `get` and `done`.
    processing: HashSet<String>,
    /// Re-adds that arrived while the identity was processing.
    parked: HashMap<String, Entry<T>>,
    shutting_down: bool,
}

/// Thread-safe delay queue with shutdown and identity coalescing.
pub struct DelayQueue<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
}

impl<T: Keyed + Send> DelayQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                scheduled: HashMap::new(),
                processing: HashSet::new(),
                parked: HashMap::new(),
                shutting_down: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Schedule `item` for delivery after `delay`.
    ///
    /// Returns `false` (dropping the item) once the queue is shutting down.
    /// Coalescing keeps the earlier of two due times for the same identity.
    pub fn add_after(&self, item: T, delay: Duration) -> bool {
        let due = Instant::now() + delay;
        let key = item.key().to_string();
        {
            let mut inner = self.inner.lock();
            if inner.shutting_down {
                return false;
            }
            let slot = if inner.processing.contains(&key) {
                &mut inner.parked
            } else {
                &mut inner.scheduled
            };
            let replace = match slot.get(&key) {
                Some(existing) => due < existing.due,
                None => true,
            };
            if replace {
                slot.insert(key, Entry { due, item });
            }
        }
        self.notify.notify_waiters();
        true
    }

    /// Dequeue the next due item, waiting until one is due or the queue
    /// shuts down. Returns `None` on shutdown. The identity of a returned
    /// item is held until [`done`](Self::done) releases it.
    pub async fn get(&self) -> Option<T> {
        loop {
            // Register for wakeups before inspecting state, so an add or
            // shutdown between the check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wait = {
                let mut inner = self.inner.lock();
                if inner.shutting_down {
                    return None;
                }
                let now = Instant::now();
                let due_key = inner
                    .scheduled
                    .iter()
                    .filter(|(_, entry)| entry.due <= now)
                    .min_by_key(|(_, entry)| entry.due)
                    .map(|(key, _)| key.clone());
                if let Some(key) = due_key {
                    if let Some(entry) = inner.scheduled.remove(&key) {
                        inner.processing.insert(key);
                        return Some(entry.item);
                    }
                }
                inner
                    .scheduled
                    .values()
                    .map(|entry| entry.due)
                    .min()
                    .map(|due| due.saturating_duration_since(now))
            };

            match wait {
                Some(delay) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Release an identity delivered by [`get`](Self::get). Any add parked
    /// while the identity was held becomes scheduled again.
    pub fn done(&self, key: &str) {
        let rescheduled = {
            let mut inner = self.inner.lock();
            inner.processing.remove(key);
            match inner.parked.remove(key) {
                Some(entry) if !inner.shutting_down => {
                    inner.scheduled.insert(key.to_string(), entry);
                    true
                }
                _ => false,
            }
        };
        if rescheduled {
            self.notify.notify_waiters();
        }
    }

    /// Unblock all current and future `get` calls. Idempotent.
    pub fn shut_down(&self) {
        {
            let mut inner = self.inner.lock();
            inner.shutting_down = true;
            inner.scheduled.clear();
            inner.parked.clear();
        }
        self.notify.notify_waiters();
    }

    pub fn shutting_down(&self) -> bool {
        self.inner.lock().shutting_down
    }

    /// Number of undelivered items (due or not).
    pub fn len(&self) -> usize {
        self.inner.lock().scheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Keyed + Send> Default for DelayQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::timeout;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(String);

    impl Item {
        fn new(id: &str) -> Self {
            Self(id.to_string())
        }
    }

    impl Keyed for Item {
        fn key(&self) -> &str {
            &self.0
        }
    }

    #[tokio::test]
    async fn delivers_immediate_items() {
        let queue = DelayQueue::new();
        assert!(queue.add_after(Item::new("a"), Duration::ZERO));
        let item = timeout(Duration::from_millis(100), queue.get())
            .await
            .expect("item should be available")
            .expect("queue not shut down");
        assert_eq!(item, Item::new("a"));
    }

    #[tokio::test]
    async fn withholds_items_until_due() {
        let queue = DelayQueue::new();
        queue.add_after(Item::new("a"), Duration::from_millis(80));

        assert!(
            timeout(Duration::from_millis(30), queue.get()).await.is_err(),
            "item must not be delivered before its due time"
        );
        let item = timeout(Duration::from_millis(200), queue.get())
            .await
            .expect("item should become due")
            .unwrap();
        assert_eq!(item, Item::new("a"));
    }

    #[tokio::test]
    async fn duplicate_adds_coalesce_to_single_delivery() {
        let queue = DelayQueue::new();
        queue.add_after(Item::new("a"), Duration::from_millis(60));
        queue.add_after(Item::new("a"), Duration::from_millis(10));
        queue.add_after(Item::new("a"), Duration::from_millis(120));

        // Earliest due time wins.
        let item = timeout(Duration::from_millis(50), queue.get())
            .await
            .expect("earliest add should win")
            .unwrap();
        assert_eq!(item, Item::new("a"));

        // And only one copy is ever delivered.
        assert!(timeout(Duration::from_millis(200), queue.get()).await.is_err());
    }

    #[tokio::test]
    async fn re_add_while_processing_is_parked_until_done() {
        let queue = DelayQueue::new();
        queue.add_after(Item::new("a"), Duration::ZERO);
        let item = queue.get().await.unwrap();

        // Re-added before done: must not be delivered yet.
        queue.add_after(Item::new("a"), Duration::ZERO);
        assert!(timeout(Duration::from_millis(50), queue.get()).await.is_err());

        queue.done(item.key());
        let again = timeout(Duration::from_millis(100), queue.get())
            .await
            .expect("parked item should be rescheduled by done")
            .unwrap();
        assert_eq!(again, Item::new("a"));
    }

    #[tokio::test]
    async fn shutdown_unblocks_consumers() {
        let queue = Arc::new(DelayQueue::<Item>::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.get().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.shut_down();
        let result = timeout(Duration::from_millis(200), consumer)
            .await
            .expect("consumer should unblock")
            .unwrap();
        assert!(result.is_none());
        assert!(queue.shutting_down());
    }

    #[tokio::test]
    async fn add_after_shutdown_is_refused() {
        let queue = DelayQueue::new();
        queue.shut_down();
        queue.shut_down(); // idempotent
        assert!(!queue.add_after(Item::new("a"), Duration::ZERO));
        assert!(queue.is_empty());
        assert!(queue.get().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn each_item_goes_to_exactly_one_consumer() {
        let queue = Arc::new(DelayQueue::<Item>::new());
        for i in 0..20 {
            queue.add_after(Item::new(&format!("item-{i}")), Duration::ZERO);
        }

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Ok(Some(item)) =
                    timeout(Duration::from_millis(100), queue.get()).await
                {
                    seen.push(item.0.clone());
                    queue.done(&item.0);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        assert_eq!(all.len(), 20, "no item delivered twice");
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 20, "every item delivered");
    }
}
