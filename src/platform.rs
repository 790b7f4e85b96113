//! Global V8 platform initialization.
//!
//! V8 can only be initialized once per process. Every bridge operation needs
//! the platform to be up, so initialization hands back a [`HostApi`] value that
//! [`Bridge`](crate::Bridge) construction requires. Holding one is proof that
//! the host API table is ready.

use std::sync::OnceLock;
use v8;

static PLATFORM: OnceLock<v8::SharedRef<v8::Platform>> = OnceLock::new();

/// Default flags applied when the caller does not provide any.
///
/// Incremental marking is disabled so forced collections finish (and run
/// their weak callbacks) synchronously.
const DEFAULT_FLAGS: &str = "--noincremental-marking";

/// Proof that the process-wide V8 platform has been initialized.
///
/// Obtained from [`initialize`] or [`initialize_with_flags`]. It carries no
/// data; it only makes "use before initialization" unrepresentable.
#[derive(Debug, Clone, Copy)]
pub struct HostApi {
    _initialized: (),
}

impl HostApi {
    /// The shared platform, for pumping its message loop.
    pub fn platform(&self) -> &'static v8::SharedRef<v8::Platform> {
        // A HostApi only exists once the OnceLock is populated.
        PLATFORM.get().unwrap_or_else(|| unreachable!("HostApi without platform"))
    }
}

/// Initialize the V8 platform with default flags.
///
/// Safe to call from multiple threads and any number of times; only the first
/// call does any work.
pub fn initialize() -> HostApi {
    initialize_with_flags(DEFAULT_FLAGS)
}

/// Initialize the V8 platform, applying `flags` if this call is the first.
///
/// Flags passed after the platform is up are ignored (V8 reads them once).
pub fn initialize_with_flags(flags: &str) -> HostApi {
    let mut applied = false;

    PLATFORM.get_or_init(|| {
        applied = true;

        if !flags.is_empty() {
            v8::V8::set_flags_from_string(flags);
        }

        // On macOS, use single-threaded GC to avoid code collection issues
        #[cfg(target_os = "macos")]
        v8::V8::set_flags_from_string("--single-threaded-gc");

        let platform = v8::new_default_platform(0, false).make_shared();
        v8::V8::initialize_platform(platform.clone());
        v8::V8::initialize();

        log::info!("V8 platform initialized (flags: {:?})", flags);
        platform
    });

    if !applied && flags != DEFAULT_FLAGS {
        log::warn!(
            "V8 platform already initialized, ignoring flags: {:?}",
            flags
        );
    }

    HostApi { _initialized: () }
}
