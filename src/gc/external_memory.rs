//! External memory accounting for attached native resources.
//!
//! V8 cannot see memory held by the native engine. Each attachment reports
//! its estimated size so the collector's heuristics account for it.
//!
//! Adjustments are never applied from the collector path: every delta lands
//! in an atomic pending counter and is applied by the next safe point that
//! holds a scope (`Bridge::settle`).

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Per-bridge ledger of external memory reported to the isolate.
#[derive(Debug, Default)]
pub struct ExternalMemoryLedger {
    /// Bytes currently held by live charges
    tracked: AtomicI64,

    /// Delta not yet applied to the isolate
    pending: AtomicI64,
}

impl ExternalMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, delta: i64) {
        if delta != 0 {
            self.tracked.fetch_add(delta, Ordering::SeqCst);
            self.pending.fetch_add(delta, Ordering::SeqCst);
            tracing::trace!("Deferred external memory adjustment: {} bytes", delta);
        }
    }

    /// Take the delta that still has to be applied to the isolate.
    pub fn take_pending(&self) -> i64 {
        self.pending.swap(0, Ordering::SeqCst)
    }

    /// Bytes currently held by live charges.
    pub fn tracked(&self) -> i64 {
        self.tracked.load(Ordering::SeqCst)
    }

    /// Delta waiting for the next safe point.
    #[cfg(test)]
    pub fn pending(&self) -> i64 {
        self.pending.load(Ordering::SeqCst)
    }
}

/// RAII charge against an [`ExternalMemoryLedger`].
///
/// Creating it records `amount` bytes; dropping it (release, detach, or the
/// record being discarded) records the matching credit. Both are applied to
/// the isolate at the next safe point.
pub struct ExternalMemoryCharge {
    amount: i64,
    ledger: Arc<ExternalMemoryLedger>,
}

impl ExternalMemoryCharge {
    pub fn new(ledger: Arc<ExternalMemoryLedger>, amount: i64) -> Self {
        ledger.record(amount);
        Self { amount, ledger }
    }

    #[cfg(test)]
    pub fn amount(&self) -> i64 {
        self.amount
    }
}

impl Drop for ExternalMemoryCharge {
    fn drop(&mut self) {
        self.ledger.record(-self.amount);
    }
}

impl std::fmt::Debug for ExternalMemoryCharge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalMemoryCharge")
            .field("amount", &self.amount)
            .finish()
    }
}
