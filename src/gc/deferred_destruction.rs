//! Deferred destruction queue for V8 weak handles.
//!
//! ## Problem
//!
//! Deleting a weak handle means touching the isolate's global handle table.
//! That is not allowed from inside a weak callback (the collector is walking
//! that table), and not safe from a thread that doesn't hold the isolate.
//! Finalizers and `detach`/`revoke` are exactly those two situations.
//!
//! ## Solution
//!
//! Park the handles here, then drop them at the next safe point: any bridge
//! operation that holds a scope, or an explicit `Bridge::settle`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// A weak reference to a managed object, owned by a bridge table.
pub(crate) struct WeakObject(pub(crate) v8::Weak<v8::Object>);

// SAFETY: WeakObject is Send because:
// - The bridge tables that own it sit behind a Mutex
// - It is only upgraded (`to_local`) by an operation holding the isolate's scope
// - Bridge operations only drop it through DeferredDestructionQueue::process_all,
//   also under a scope; the rest go when the bridge state itself is dropped,
//   which `Bridge` requires to happen on the isolate's thread
unsafe impl Send for WeakObject {}

/// Per-bridge queue of weak handles awaiting deletion.
///
/// Thread-safe; handles can be queued from finalizers or any thread.
/// Pending handles are dropped when `process_all()` runs under a scope.
pub struct DeferredDestructionQueue {
    queue: Mutex<VecDeque<WeakObject>>,

    /// Fast check for pending items (avoids lock acquisition on hot path)
    pending_count: AtomicU64,
}

impl Default for DeferredDestructionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredDestructionQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(8)),
            pending_count: AtomicU64::new(0),
        }
    }

    /// Queue a weak handle for deletion at the next safe point.
    pub(crate) fn defer(&self, handle: WeakObject) {
        self.queue
            .lock()
            .expect("deferred destruction queue poisoned")
            .push_back(handle);
        self.pending_count.fetch_add(1, Ordering::Release);

        tracing::trace!("Deferred weak handle deletion (pending: {})", self.len());
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending_count.load(Ordering::Acquire) > 0
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.pending_count.load(Ordering::Acquire)
    }

    /// Drop every parked handle. Returns how many were dropped.
    ///
    /// Must run on the isolate's thread, outside any weak callback.
    pub fn process_all(&self) -> usize {
        if !self.has_pending() {
            return 0;
        }

        let handles: VecDeque<WeakObject> = {
            let mut queue = self
                .queue
                .lock()
                .expect("deferred destruction queue poisoned");
            std::mem::take(&mut *queue)
        };

        let count = handles.len();

        if count == 0 {
            return 0;
        }

        // Dropped outside the queue lock: deleting a handle never re-enters
        // the queue, but a concurrent defer() should not wait on it.
        drop(handles);

        self.pending_count
            .fetch_sub(count as u64, Ordering::Release);

        tracing::trace!("Processed {} deferred weak handle deletions", count);
        count
    }
}

impl std::fmt::Debug for DeferredDestructionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredDestructionQueue")
            .field("pending_count", &self.len())
            .finish()
    }
}
