//! Collector-path plumbing shared by the finalizer and the token bridge.
//!
//! Nothing in here touches the isolate from a weak callback. Work that needs
//! the isolate is parked and replayed at the next safe point.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Weak callback (collector-driven, any time)                 │
//! │  ├── removes its record from the bridge table               │
//! │  ├── hands the resource to the ReleaseDispatcher            │
//! │  ├── parks the weak handle in DeferredDestructionQueue      │
//! │  └── drops the ExternalMemoryCharge (credit is deferred)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bridge::settle(scope) (safe point)                         │
//! │  ├── drops parked weak handles                              │
//! │  └── applies pending external memory delta to the isolate   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod deferred_destruction;
mod external_memory;

pub use deferred_destruction::DeferredDestructionQueue;
pub(crate) use deferred_destruction::WeakObject;
pub use external_memory::{ExternalMemoryCharge, ExternalMemoryLedger};
