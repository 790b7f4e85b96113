//! The bridge context object.
//!
//! A [`Bridge`] owns the per-isolate tables behind registrations and opaque
//! tokens. Every boundary operation is a method on it, and constructing one
//! requires a [`HostApi`], so nothing can run before the platform is up.
//!
//! One bridge serves one isolate. Weak callbacks hold a strong reference to
//! the bridge's shared state, so resources attached through a bridge are still
//! released if the `Bridge` value itself is dropped first.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::{BridgeConfig, ReleasePolicy};
use crate::engine::{NativeEngine, NativeResource};
use crate::finalizer::Attachment;
use crate::gc::{DeferredDestructionQueue, ExternalMemoryLedger, WeakObject};
use crate::platform::HostApi;
use crate::registry::HandleTable;
use crate::release::{ReleaseDispatcher, ReleaseWorker};

/// State reachable from weak callbacks.
pub(crate) struct Shared {
    pub(crate) attachments: HandleTable<Attachment>,
    /// Resource -> registration currently responsible for releasing it
    claims: Mutex<HashMap<NativeResource, NonZeroU64>>,
    pub(crate) tokens: HandleTable<WeakObject>,
    pub(crate) deferred: DeferredDestructionQueue,
    pub(crate) memory: Arc<ExternalMemoryLedger>,
    pub(crate) dispatcher: ReleaseDispatcher,
    pub(crate) resources_released: AtomicU64,
    pub(crate) tokens_finalized: AtomicU64,
}

/// Per-isolate bridge state and operations.
///
/// A bridge may be moved to and shared with other threads, but it must be
/// dropped on the thread that owns its isolate, while that isolate is alive
/// or after it has been disposed. Dropping it releases the weak handles it
/// still owns. [`detach`](Self::detach), [`revoke`](Self::revoke) and
/// [`stats`](Self::stats) never touch the isolate and are callable from any
/// thread.
pub struct Bridge {
    pub(crate) shared: Arc<Shared>,
    pub(crate) config: BridgeConfig,
    release_worker: Mutex<Option<ReleaseWorker>>,
}

/// Point-in-time counters for a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeStats {
    /// Registrations whose finalizer has neither fired nor been detached
    pub live_registrations: usize,
    /// Tokens whose record still exists
    pub live_tokens: usize,
    /// Resources handed to release by a finalizer
    pub resources_released: u64,
    /// Token records destroyed by their finalizer
    pub tokens_finalized: u64,
    /// Weak handles waiting for the next safe point
    pub deferred_handles: u64,
    /// Bytes of external memory held by live registrations
    pub external_bytes: i64,
}

impl Bridge {
    pub fn new(api: HostApi, engine: impl NativeEngine, config: BridgeConfig) -> Self {
        Self::with_engine(api, Arc::new(engine), config)
    }

    pub fn with_engine(
        _api: HostApi,
        engine: Arc<dyn NativeEngine>,
        config: BridgeConfig,
    ) -> Self {
        let (dispatcher, release_worker) = ReleaseDispatcher::new(config.release_policy, engine);

        tracing::debug!("Creating bridge ({:?})", config);

        Self {
            shared: Arc::new(Shared {
                attachments: HandleTable::new(),
                claims: Mutex::new(HashMap::new()),
                tokens: HandleTable::new(),
                deferred: DeferredDestructionQueue::new(),
                memory: Arc::new(ExternalMemoryLedger::new()),
                dispatcher,
                resources_released: AtomicU64::new(0),
                tokens_finalized: AtomicU64::new(0),
            }),
            config,
            release_worker: Mutex::new(release_worker),
        }
    }

    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Take the worker that performs offloaded releases.
    ///
    /// Returns `Some` exactly once, and only under [`ReleasePolicy::Offload`].
    pub fn take_release_worker(&self) -> Option<ReleaseWorker> {
        self.release_worker
            .lock()
            .expect("release worker slot poisoned")
            .take()
    }

    /// Safe point: drop weak handles parked by finalizers, `detach` and
    /// `revoke`, and apply pending external memory adjustments.
    ///
    /// Every operation taking a scope calls this first. Call it directly when
    /// the isolate is idle for long stretches.
    pub fn settle(&self, scope: &mut v8::PinScope<'_, '_>) {
        let dropped = self.shared.deferred.process_all();

        let delta = self.shared.memory.take_pending();
        if delta != 0 && self.config.track_external_memory {
            scope.adjust_amount_of_external_allocated_memory(delta);
        }

        if dropped > 0 || delta != 0 {
            tracing::debug!(
                "Settled bridge: {} weak handles dropped, {} bytes external memory adjusted",
                dropped,
                delta
            );
        }
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            live_registrations: self.shared.attachments.len(),
            live_tokens: self.shared.tokens.len(),
            resources_released: self.shared.resources_released.load(Ordering::Acquire),
            tokens_finalized: self.shared.tokens_finalized.load(Ordering::Acquire),
            deferred_handles: self.shared.deferred.len(),
            external_bytes: self.shared.memory.tracked(),
        }
    }
}

impl Shared {
    /// Finalizer for a registration: the object is gone, release its resource.
    pub(crate) fn finalize_attachment(&self, id: NonZeroU64) {
        // Missing means detach() won the race; the caller owns the resource.
        let Some(attachment) = self.attachments.remove(id) else {
            return;
        };

        let (weak, resource) = attachment.into_parts();
        self.unclaim(resource, id);
        self.deferred.defer(weak);
        self.dispatcher.dispatch(resource);
        self.resources_released.fetch_add(1, Ordering::AcqRel);

        tracing::trace!("Registration {} finalized, released {:?}", id, resource);
    }

    /// Finalizer for a token record: the record destroys itself.
    pub(crate) fn finalize_token(&self, id: NonZeroU64) {
        let Some(weak) = self.tokens.remove(id) else {
            return;
        };

        self.deferred.defer(weak);
        self.tokens_finalized.fetch_add(1, Ordering::AcqRel);

        tracing::trace!("Token {} finalized", id);
    }

    /// Make `id` the only registration allowed to release `resource`.
    ///
    /// Fails with the current owner if another registration holds it.
    pub(crate) fn claim(&self, resource: NativeResource, id: NonZeroU64) -> Result<(), NonZeroU64> {
        let mut claims = self.claims.lock().expect("resource claims poisoned");

        match claims.get(&resource) {
            Some(owner) => Err(*owner),
            None => {
                claims.insert(resource, id);
                Ok(())
            }
        }
    }

    pub(crate) fn unclaim(&self, resource: NativeResource, id: NonZeroU64) {
        let mut claims = self.claims.lock().expect("resource claims poisoned");

        if claims.get(&resource) == Some(&id) {
            claims.remove(&resource);
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Builder for [`Bridge`].
pub struct BridgeBuilder {
    config: BridgeConfig,
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
        }
    }

    pub fn release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.config.release_policy = policy;
        self
    }

    pub fn track_external_memory(mut self, enabled: bool) -> Self {
        self.config.track_external_memory = enabled;
        self
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self, api: HostApi, engine: impl NativeEngine) -> Bridge {
        Bridge::new(api, engine, self.config)
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
