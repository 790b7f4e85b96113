//! Checked failures of the bridge's boundary operations.
//!
//! Conditions the host runtime cannot recover from (handle allocation
//! failure, a panicking engine release) are not represented here: V8 aborts on
//! the former, the bridge aborts on the latter.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The token was never issued by this bridge, was revoked, or its record
    /// was destroyed after the wrapped object was collected.
    #[error("opaque token {0} does not refer to a live record")]
    UnknownToken(u64),

    /// The record still exists but the collector already cleared the object;
    /// its finalizer has not run yet.
    #[error("object behind opaque token {0} has been collected")]
    Collected(u64),

    /// The registration is active but belongs to a different object.
    #[error("finalization registration {0} was created for a different object")]
    HandleMismatch(u64),

    /// The native resource already has an active registration.
    #[error("native resource {0:#x} is already attached to registration {1}")]
    AlreadyAttached(usize, u64),
}
