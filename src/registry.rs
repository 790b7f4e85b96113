//! Id-keyed tables backing opaque tokens and finalization registrations.
//!
//! Ids are allocated from a monotonically increasing counter starting at 1
//! and are never reused, so a stale id always misses instead of aliasing a
//! newer record.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct HandleTable<T> {
    next_id: AtomicU64,
    entries: Mutex<HashMap<NonZeroU64, T>>,
}

impl<T> HandleTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate an id before the record exists (its finalizer needs the id).
    pub(crate) fn reserve(&self) -> NonZeroU64 {
        let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
        NonZeroU64::new(raw).unwrap_or_else(|| unreachable!("handle id counter wrapped"))
    }

    pub(crate) fn insert(&self, id: NonZeroU64, value: T) {
        self.entries
            .lock()
            .expect("handle table poisoned")
            .insert(id, value);
    }

    pub(crate) fn remove(&self, id: NonZeroU64) -> Option<T> {
        self.entries
            .lock()
            .expect("handle table poisoned")
            .remove(&id)
    }

    /// Run `f` against the record, holding the table lock.
    ///
    /// `f` must not call into anything that can trigger a collection: the
    /// weak callbacks it would run take this same lock.
    pub(crate) fn with<R>(&self, id: NonZeroU64, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.entries
            .lock()
            .expect("handle table poisoned")
            .get(&id)
            .map(f)
    }

    pub(crate) fn contains(&self, id: NonZeroU64) -> bool {
        self.entries
            .lock()
            .expect("handle table poisoned")
            .contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().expect("handle table poisoned").len()
    }
}
