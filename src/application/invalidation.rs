//! Cache invalidation events.
//!
//! Pipelines emit targets to an [`InvalidationSink`] and move on; consumers
//! drain them at their own pace.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

/// Monotonic per-process ordering of events.
pub type Epoch = u64;

/// Cached view that became stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InvalidationTarget {
    PostDetail { slug: String },
    Home,
    AuthorDashboard { author_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct InvalidationEvent {
    pub id: Uuid,
    pub epoch: Epoch,
    pub target: InvalidationTarget,
    pub timestamp: OffsetDateTime,
}

impl InvalidationEvent {
    pub fn new(target: InvalidationTarget, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            target,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Fire-and-forget receiver of invalidation targets. Must not block.
pub trait InvalidationSink: Send + Sync {
    fn emit(&self, target: InvalidationTarget);
}

/// In-memory FIFO of invalidation events.
pub struct InvalidationQueue {
    queue: Mutex<VecDeque<InvalidationEvent>>,
    epoch_counter: AtomicU64,
}

impl InvalidationQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<InvalidationEvent> {
        let mut queue = self.lock("drain");
        let count = limit.min(queue.len());
        queue.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        self.lock("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self, op: &'static str) -> MutexGuard<'_, VecDeque<InvalidationEvent>> {
        match self.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    op,
                    result = "poisoned_recovered",
                    "Recovered from poisoned invalidation queue lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

impl Default for InvalidationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationSink for InvalidationQueue {
    fn emit(&self, target: InvalidationTarget) {
        let event = InvalidationEvent::new(target, self.next_epoch());

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            target = ?event.target,
            "Invalidation enqueued"
        );

        self.lock("emit").push_back(event);
    }
}
