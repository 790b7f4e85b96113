#![allow(dead_code)]

use gc_handle_bridge::{HostApi, NativeEngine, NativeResource, platform};
use std::pin::pin;
use std::sync::{Arc, Mutex};

/// Initialize logging and the V8 platform (once per process).
pub fn init() -> HostApi {
    let _ = env_logger::builder().is_test(true).try_init();
    platform::initialize()
}

pub fn new_isolate() -> v8::OwnedIsolate {
    v8::Isolate::new(v8::CreateParams::default())
}

/// Run `f` inside a fresh handle scope and context.
///
/// Locals created in `f` die with the scope; return a `v8::Global` to keep
/// an object reachable past it.
pub fn with_scope<R>(
    isolate: &mut v8::OwnedIsolate,
    f: impl FnOnce(&mut v8::PinScope<'_, '_>) -> R,
) -> R {
    let scope = pin!(v8::HandleScope::new(isolate));
    let mut scope = scope.init();
    let context = v8::Context::new(&scope, Default::default());
    let scope = &mut v8::ContextScope::new(&mut scope, context);
    f(scope)
}

/// Force a full collection and run any weak callbacks it scheduled.
pub fn collect_garbage(api: HostApi, isolate: &mut v8::OwnedIsolate) {
    isolate.low_memory_notification();
    while v8::Platform::pump_message_loop(api.platform(), isolate, false) {}
}

pub fn resource(addr: usize) -> NativeResource {
    NativeResource::from_addr(addr).unwrap()
}

/// Engine that records every release it receives.
#[derive(Clone, Default)]
pub struct RecordingEngine {
    released: Arc<Mutex<Vec<usize>>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn released(&self) -> Vec<usize> {
        self.released.lock().unwrap().clone()
    }

    pub fn release_count(&self, addr: usize) -> usize {
        self.released
            .lock()
            .unwrap()
            .iter()
            .filter(|released| **released == addr)
            .count()
    }
}

impl NativeEngine for RecordingEngine {
    fn release(&self, resource: NativeResource) {
        self.released.lock().unwrap().push(resource.addr());
    }
}
