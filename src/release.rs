//! Release dispatch: getting a collected object's native resource to the
//! engine's release, either inline from the finalizer or through a worker.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::ReleasePolicy;
use crate::engine::{NativeEngine, NativeResource};

pub(crate) enum ReleaseDispatcher {
    Inline(Arc<dyn NativeEngine>),
    Offload {
        tx: mpsc::UnboundedSender<NativeResource>,
        engine: Arc<dyn NativeEngine>,
    },
}

impl ReleaseDispatcher {
    pub(crate) fn new(
        policy: ReleasePolicy,
        engine: Arc<dyn NativeEngine>,
    ) -> (Self, Option<ReleaseWorker>) {
        match policy {
            ReleasePolicy::Inline => (Self::Inline(engine), None),
            ReleasePolicy::Offload => {
                let (tx, rx) = mpsc::unbounded_channel();
                let worker = ReleaseWorker {
                    rx,
                    engine: engine.clone(),
                    released: 0,
                };
                (Self::Offload { tx, engine }, Some(worker))
            }
        }
    }

    /// Hand `resource` to the engine. Called from finalizers: never blocks.
    pub(crate) fn dispatch(&self, resource: NativeResource) {
        match self {
            Self::Inline(engine) => release_or_abort(engine.as_ref(), resource),
            Self::Offload { tx, engine } => {
                if let Err(mpsc::error::SendError(resource)) = tx.send(resource) {
                    // Worker is gone; releasing here is the only way to not leak.
                    tracing::warn!(
                        "Release worker dropped, releasing {:?} inline",
                        resource
                    );
                    release_or_abort(engine.as_ref(), resource);
                }
            }
        }
    }
}

/// Call the engine's release, from a weak callback or the release worker.
///
/// A release that panics has broken the engine's contract. Unwinding into
/// the collector is not an option, and a worker that unwound would drop every
/// resource still queued behind it, so the process aborts.
fn release_or_abort(engine: &dyn NativeEngine, resource: NativeResource) {
    if catch_unwind(AssertUnwindSafe(|| engine.release(resource))).is_err() {
        tracing::error!("Native release of {:?} panicked, aborting", resource);
        std::process::abort();
    }

    tracing::trace!("Released {:?}", resource);
}

/// Performs releases queued under [`ReleasePolicy::Offload`].
///
/// Obtained once from [`Bridge::take_release_worker`](crate::Bridge::take_release_worker).
/// Either call [`drain`](Self::drain) periodically or spawn [`run`](Self::run).
/// Dropping the worker makes later finalizers release inline.
pub struct ReleaseWorker {
    rx: mpsc::UnboundedReceiver<NativeResource>,
    engine: Arc<dyn NativeEngine>,
    released: u64,
}

impl ReleaseWorker {
    /// Release everything queued so far. Returns how many were released.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;

        while let Ok(resource) = self.rx.try_recv() {
            release_or_abort(self.engine.as_ref(), resource);
            count += 1;
        }

        self.released += count as u64;

        if count > 0 {
            tracing::debug!("Release worker drained {} resources", count);
        }

        count
    }

    /// Release queued resources until every sender is gone (the bridge and
    /// all pending finalizers). Returns the total released by this worker.
    pub async fn run(mut self) -> u64 {
        while let Some(resource) = self.rx.recv().await {
            release_or_abort(self.engine.as_ref(), resource);
            self.released += 1;
        }

        tracing::debug!("Release worker finished ({} released)", self.released);
        self.released
    }

    /// Number of resources this worker has released.
    pub fn released(&self) -> u64 {
        self.released
    }
}

impl std::fmt::Debug for ReleaseWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseWorker")
            .field("released", &self.released)
            .finish()
    }
}
