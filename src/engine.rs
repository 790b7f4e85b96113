//! The native engine seam.
//!
//! The bridge needs exactly one capability from the native database engine:
//! releasing a pointer it handed out. Everything else about the engine is
//! opaque here.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

/// An opaque pointer into the native engine's state.
///
/// Owned by the engine. Exactly one release is valid over its lifetime, and
/// the bridge guarantees it issues at most one.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeResource(NonNull<c_void>);

// SAFETY: NativeResource is Send + Sync because:
// - It is an opaque address; the bridge never dereferences it
// - The only operation performed on it is handing it back to the engine's
//   release, which the engine defines as callable from any thread
unsafe impl Send for NativeResource {}
unsafe impl Sync for NativeResource {}

impl NativeResource {
    /// Wrap a pointer issued by the native engine. Returns `None` for null.
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// Wrap a raw address (convenient for engines that hand out integers).
    pub fn from_addr(addr: usize) -> Option<Self> {
        Self::new(addr as *mut c_void)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }

    pub fn addr(&self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Debug for NativeResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeResource({:#x})", self.addr())
    }
}

/// The native engine's release capability.
///
/// `release` is called from collector-driven finalizers (or from a
/// [`ReleaseWorker`](crate::ReleaseWorker)), on whatever thread the host
/// runtime chooses. It must not fail for a pointer the engine issued, and it
/// should return quickly.
pub trait NativeEngine: Send + Sync + 'static {
    fn release(&self, resource: NativeResource);
}

impl<F> NativeEngine for F
where
    F: Fn(NativeResource) + Send + Sync + 'static,
{
    fn release(&self, resource: NativeResource) {
        self(resource)
    }
}

/// Signature of a C release symbol exported by the native engine.
pub type ReleaseFn = unsafe extern "C" fn(*mut c_void);

/// Adapter over a C release entry point (e.g. `realm_release`).
#[derive(Clone, Copy)]
pub struct ForeignEngine {
    release: ReleaseFn,
}

impl ForeignEngine {
    /// # Safety
    ///
    /// `release` must accept every pointer the engine issues, exactly once,
    /// from any thread, without unwinding.
    pub unsafe fn new(release: ReleaseFn) -> Self {
        Self { release }
    }
}

impl NativeEngine for ForeignEngine {
    fn release(&self, resource: NativeResource) {
        // SAFETY: guaranteed by the contract of ForeignEngine::new; the bridge
        // hands each resource to release at most once.
        unsafe { (self.release)(resource.as_ptr()) }
    }
}

impl fmt::Debug for ForeignEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignEngine")
            .field("release", &(self.release as *const c_void))
            .finish()
    }
}
