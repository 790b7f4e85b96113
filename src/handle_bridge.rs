//! Opaque Handle Bridge.
//!
//! Turns a managed object into a pointer-sized token the native side can
//! store (as a map key, or as a callback's "user data") and later exchange
//! back for the object.
//!
//! A token indexes a record in the bridge's token table. The record holds a
//! weak handle whose finalizer removes the record when the object is
//! collected, so a token outliving its object resolves to an error rather
//! than a dangling handle.

use std::ffi::c_void;
use std::num::NonZeroU64;
use std::sync::Arc;

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::gc::WeakObject;

/// A storable stand-in for a managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpaqueToken(NonZeroU64);

impl OpaqueToken {
    pub fn get(&self) -> u64 {
        self.0.get()
    }

    /// Encode as a native "user data" pointer. Never null.
    pub fn into_user_data(self) -> *mut c_void {
        self.0.get() as usize as *mut c_void
    }

    /// Decode a pointer produced by [`into_user_data`](Self::into_user_data).
    ///
    /// Any non-null value decodes; whether it names a live record is checked
    /// by [`Bridge::resolve`].
    pub fn from_user_data(ptr: *mut c_void) -> Option<Self> {
        NonZeroU64::new(ptr as usize as u64).map(Self)
    }
}

impl Bridge {
    /// Wrap `handle` into an opaque token.
    ///
    /// The token resolves for as long as the object is alive. Once the object
    /// is collected its record is destroyed and the token stops resolving.
    pub fn wrap<'s>(
        &self,
        scope: &mut v8::PinScope<'s, '_>,
        handle: v8::Local<'s, v8::Object>,
    ) -> OpaqueToken {
        self.settle(scope);

        let shared = &self.shared;
        let id = shared.tokens.reserve();

        let finalizer_state = Arc::clone(shared);
        let weak = v8::Weak::with_finalizer(
            scope,
            handle,
            Box::new(move |_| finalizer_state.finalize_token(id)),
        );

        shared.tokens.insert(id, WeakObject(weak));

        tracing::trace!("Wrapped object as token {}", id);
        OpaqueToken(id)
    }

    /// Exchange `token` for a live handle to the object it wraps.
    ///
    /// The handle lives in the caller's scope. Fails with
    /// [`BridgeError::Collected`] if the collector has cleared the object but
    /// the record's finalizer has not run yet. V8 runs that finalizer as a
    /// second-pass callback: synchronously for forced full collections
    /// (`low_memory_notification`), otherwise from a platform task.
    pub fn resolve<'s>(
        &self,
        scope: &mut v8::PinScope<'s, '_>,
        token: OpaqueToken,
    ) -> Result<v8::Local<'s, v8::Object>, BridgeError> {
        self.settle(scope);

        self.shared
            .tokens
            .with(token.0, |weak| weak.0.to_local(scope))
            .ok_or(BridgeError::UnknownToken(token.get()))?
            .ok_or(BridgeError::Collected(token.get()))
    }

    /// Destroy the record behind `token` before its object is collected.
    ///
    /// Later `resolve` calls fail with [`BridgeError::UnknownToken`]. Returns
    /// `false` if there was no record.
    pub fn revoke(&self, token: OpaqueToken) -> bool {
        let Some(weak) = self.shared.tokens.remove(token.0) else {
            return false;
        };

        self.shared.deferred.defer(weak);
        tracing::trace!("Revoked token {}", token.0);
        true
    }

    /// Whether `token` still has a record.
    pub fn is_live(&self, token: OpaqueToken) -> bool {
        self.shared.tokens.contains(token.0)
    }
}
