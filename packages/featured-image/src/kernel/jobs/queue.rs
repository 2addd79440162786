//! Deduplicating queue of pending generation runs.

use std::collections::HashSet;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::common::PostId;

/// Receiving half handed to the worker.
pub type GenerationReceiver = mpsc::UnboundedReceiver<PostId>;

/// Result type for schedule operations that handles idempotency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// A run was queued
    Created(PostId),
    /// A run for this post is already pending
    Duplicate(PostId),
}

impl EnqueueResult {
    /// Returns true if this was a newly queued run
    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

/// Pending runs keyed by post id.
///
/// An id stays pending from `schedule` until the worker picks it up (or it
/// is unscheduled), so scheduling twice in that window queues one run.
#[derive(Debug)]
pub struct GenerationQueue {
    pending: Mutex<HashSet<PostId>>,
    sender: mpsc::UnboundedSender<PostId>,
}

impl GenerationQueue {
    pub fn new() -> (Self, GenerationReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                pending: Mutex::new(HashSet::new()),
                sender,
            },
            receiver,
        )
    }

    /// Queue a run and wake the worker.
    pub fn schedule(&self, post_id: PostId) -> EnqueueResult {
        let mut pending = self.lock();
        if !pending.insert(post_id) {
            debug!(post_id = %post_id, "Generation already pending");
            return EnqueueResult::Duplicate(post_id);
        }

        if self.sender.send(post_id).is_err() {
            // Worker is gone; the id stays pending until unscheduled.
            warn!(post_id = %post_id, "Generation worker is not running");
        }
        EnqueueResult::Created(post_id)
    }

    /// Drop a pending run. Returns whether one was pending.
    pub fn unschedule(&self, post_id: PostId) -> bool {
        self.lock().remove(&post_id)
    }

    pub fn is_pending(&self, post_id: PostId) -> bool {
        self.lock().contains(&post_id)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    /// Called by the worker when a run starts. A `false` return means the
    /// entry was unscheduled (or already taken) and must not run.
    pub(crate) fn take(&self, post_id: PostId) -> bool {
        self.lock().remove(&post_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<PostId>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
