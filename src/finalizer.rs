//! Native Resource Finalizer.
//!
//! Ties a native resource's release to a managed object's collection. The
//! weak handle behind each registration uses a guaranteed finalizer, so the
//! release also happens if the isolate is disposed while the object is still
//! alive.

use std::num::NonZeroU64;
use std::sync::Arc;

use crate::bridge::Bridge;
use crate::engine::NativeResource;
use crate::error::BridgeError;
use crate::gc::{ExternalMemoryCharge, WeakObject};

/// Token for an active finalization registration.
///
/// Returned by [`Bridge::attach`]; pass it to [`Bridge::detach`] to take
/// over the resource's teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Registration(NonZeroU64);

impl Registration {
    pub fn id(&self) -> u64 {
        self.0.get()
    }
}

/// The record kept for a registration until it fires or is detached.
pub(crate) struct Attachment {
    weak: WeakObject,
    resource: NativeResource,
    _charge: Option<ExternalMemoryCharge>,
}

impl Attachment {
    /// Split into the parts the caller still needs; the memory charge is
    /// dropped here, recording its credit.
    pub(crate) fn into_parts(self) -> (WeakObject, NativeResource) {
        (self.weak, self.resource)
    }
}

/// Saturate sizes V8 cannot represent instead of wrapping to a credit.
fn external_bytes(estimated_size: usize) -> i64 {
    i64::try_from(estimated_size).unwrap_or(i64::MAX)
}

impl Bridge {
    /// Release `resource` through the engine once `handle` is collected.
    ///
    /// `estimated_size` is the resource's native footprint in bytes, reported
    /// to V8 as external memory so collection pressure reflects it.
    pub fn attach<'s>(
        &self,
        scope: &mut v8::PinScope<'s, '_>,
        handle: v8::Local<'s, v8::Object>,
        resource: NativeResource,
        estimated_size: usize,
    ) -> Result<Registration, BridgeError> {
        let shared = &self.shared;
        let id = shared.attachments.reserve();

        shared
            .claim(resource, id)
            .map_err(|owner| BridgeError::AlreadyAttached(resource.addr(), owner.get()))?;

        let finalizer_state = Arc::clone(shared);
        let weak = v8::Weak::with_guaranteed_finalizer(
            scope,
            handle,
            Box::new(move || finalizer_state.finalize_attachment(id)),
        );

        let charge = self.config.track_external_memory.then(|| {
            ExternalMemoryCharge::new(shared.memory.clone(), external_bytes(estimated_size))
        });

        shared.attachments.insert(
            id,
            Attachment {
                weak: WeakObject(weak),
                resource,
                _charge: charge,
            },
        );

        // Reports the new charge right away.
        self.settle(scope);

        tracing::trace!(
            "Attached {:?} ({} bytes) as registration {}",
            resource,
            estimated_size,
            id
        );

        Ok(Registration(id))
    }

    /// Cancel a registration without releasing its resource; the caller now
    /// owns the teardown.
    ///
    /// Returns `false` (and does nothing) if the registration already fired
    /// or was detached before.
    pub fn detach(&self, registration: Registration) -> bool {
        let shared = &self.shared;

        let Some(attachment) = shared.attachments.remove(registration.0) else {
            return false;
        };

        let (weak, resource) = attachment.into_parts();
        shared.unclaim(resource, registration.0);
        // Deleting the handle cancels its finalizer; that happens at the next
        // safe point. If the finalizer fires first, it finds no record.
        shared.deferred.defer(weak);

        tracing::trace!("Detached registration {} ({:?})", registration.0, resource);
        true
    }

    /// Delete the finalizable handle behind `registration`, checking that it
    /// was created for `handle`.
    ///
    /// Returns `Ok(false)` if the registration is no longer active, and
    /// [`BridgeError::HandleMismatch`] (leaving it active) if it belongs to a
    /// different object.
    pub fn delete_finalizable<'s>(
        &self,
        scope: &mut v8::PinScope<'s, '_>,
        registration: Registration,
        handle: v8::Local<'s, v8::Object>,
    ) -> Result<bool, BridgeError> {
        self.settle(scope);

        let owned_by_handle = self
            .shared
            .attachments
            .with(registration.0, |attachment| {
                attachment
                    .weak
                    .0
                    .to_local(scope)
                    .is_some_and(|object| object.strict_equals(handle.into()))
            });

        match owned_by_handle {
            None => Ok(false),
            Some(false) => Err(BridgeError::HandleMismatch(registration.id())),
            Some(true) => Ok(self.detach(registration)),
        }
    }

    /// Whether the registration is still waiting for its object's collection.
    pub fn is_attached(&self, registration: Registration) -> bool {
        self.shared.attachments.contains(registration.0)
    }
}
