mod common;

use common::{RecordingEngine, collect_garbage, init, new_isolate, resource, with_scope};
use gc_handle_bridge::{Bridge, BridgeConfig, BridgeError, ReleasePolicy};

#[test]
fn test_release_after_collection() {
    let api = init();
    let mut isolate = new_isolate();
    let engine = RecordingEngine::new();
    let bridge = Bridge::new(api, engine.clone(), BridgeConfig::default());

    let keep_alive = with_scope(&mut isolate, |scope| {
        let dropped = v8::Object::new(scope);
        bridge.attach(scope, dropped, resource(0xAAAA), 64).unwrap();

        let kept = v8::Object::new(scope);
        bridge.attach(scope, kept, resource(0xBBBB), 64).unwrap();
        v8::Global::new(scope, kept)
    });

    assert!(engine.released().is_empty());

    collect_garbage(api, &mut isolate);

    // Only the unreachable object's resource, exactly once
    assert_eq!(engine.released(), vec![0xAAAA]);

    let stats = bridge.stats();
    assert_eq!(stats.resources_released, 1);
    assert_eq!(stats.live_registrations, 1);

    // Further collections must not release it again
    collect_garbage(api, &mut isolate);
    assert_eq!(engine.release_count(0xAAAA), 1);
    assert_eq!(engine.release_count(0xBBBB), 0);

    drop(keep_alive);
}

#[test]
fn test_not_released_while_reachable() {
    let api = init();
    let mut isolate = new_isolate();
    let engine = RecordingEngine::new();
    let bridge = Bridge::new(api, engine.clone(), BridgeConfig::default());

    let (registration, keep_alive) = with_scope(&mut isolate, |scope| {
        let obj = v8::Object::new(scope);
        let registration = bridge.attach(scope, obj, resource(0x10), 0).unwrap();
        (registration, v8::Global::new(scope, obj))
    });

    collect_garbage(api, &mut isolate);
    collect_garbage(api, &mut isolate);

    assert!(engine.released().is_empty());
    assert!(bridge.is_attached(registration));

    drop(keep_alive);
    collect_garbage(api, &mut isolate);

    assert_eq!(engine.released(), vec![0x10]);
    assert!(!bridge.is_attached(registration));
}

#[test]
fn test_detach_prevents_release() {
    let api = init();
    let mut isolate = new_isolate();
    let engine = RecordingEngine::new();
    let bridge = Bridge::new(api, engine.clone(), BridgeConfig::default());

    let registration = with_scope(&mut isolate, |scope| {
        let obj = v8::Object::new(scope);
        bridge.attach(scope, obj, resource(0xCCCC), 128).unwrap()
    });

    assert!(bridge.detach(registration));
    assert!(!bridge.is_attached(registration));

    collect_garbage(api, &mut isolate);

    assert!(engine.released().is_empty());
    assert_eq!(bridge.stats().resources_released, 0);

    // Already detached: no-op
    assert!(!bridge.detach(registration));

    // Nor at isolate disposal
    with_scope(&mut isolate, |scope| bridge.settle(scope));
    drop(isolate);
    assert!(engine.released().is_empty());
}

#[test]
fn test_detach_after_release_is_noop() {
    let api = init();
    let mut isolate = new_isolate();
    let engine = RecordingEngine::new();
    let bridge = Bridge::new(api, engine.clone(), BridgeConfig::default());

    let registration = with_scope(&mut isolate, |scope| {
        let obj = v8::Object::new(scope);
        bridge.attach(scope, obj, resource(0x20), 0).unwrap()
    });

    collect_garbage(api, &mut isolate);
    assert_eq!(engine.released(), vec![0x20]);

    assert!(!bridge.detach(registration));
    assert_eq!(engine.released(), vec![0x20]);
}

#[test]
fn test_same_resource_cannot_be_attached_twice() {
    let api = init();
    let mut isolate = new_isolate();
    let engine = RecordingEngine::new();
    let bridge = Bridge::new(api, engine.clone(), BridgeConfig::default());

    with_scope(&mut isolate, |scope| {
        let first = v8::Object::new(scope);
        let second = v8::Object::new(scope);

        let registration = bridge.attach(scope, first, resource(0x30), 0).unwrap();
        let err = bridge.attach(scope, second, resource(0x30), 0).unwrap_err();

        assert_eq!(err, BridgeError::AlreadyAttached(0x30, registration.id()));
        assert_eq!(bridge.stats().live_registrations, 1);

        // Once detached, the resource can be handed to another object
        assert!(bridge.detach(registration));
        assert!(bridge.attach(scope, second, resource(0x30), 0).is_ok());
    });

    collect_garbage(api, &mut isolate);
    assert_eq!(engine.released(), vec![0x30]);
}

#[test]
fn test_delete_finalizable_checks_handle() {
    let api = init();
    let mut isolate = new_isolate();
    let engine = RecordingEngine::new();
    let bridge = Bridge::new(api, engine.clone(), BridgeConfig::default());

    with_scope(&mut isolate, |scope| {
        let owner = v8::Object::new(scope);
        let stranger = v8::Object::new(scope);
        let registration = bridge.attach(scope, owner, resource(0x40), 0).unwrap();

        assert_eq!(
            bridge.delete_finalizable(scope, registration, stranger),
            Err(BridgeError::HandleMismatch(registration.id()))
        );
        assert!(bridge.is_attached(registration));

        assert_eq!(
            bridge.delete_finalizable(scope, registration, owner),
            Ok(true)
        );
        assert_eq!(
            bridge.delete_finalizable(scope, registration, owner),
            Ok(false)
        );
    });

    collect_garbage(api, &mut isolate);
    assert!(engine.released().is_empty());
}

#[test]
fn test_isolate_disposal_releases_remaining() {
    let api = init();
    let mut isolate = new_isolate();
    let engine = RecordingEngine::new();
    let bridge = Bridge::new(api, engine.clone(), BridgeConfig::default());

    let keep_alive = with_scope(&mut isolate, |scope| {
        let obj = v8::Object::new(scope);
        bridge.attach(scope, obj, resource(0x50), 0).unwrap();
        v8::Global::new(scope, obj)
    });

    collect_garbage(api, &mut isolate);
    assert!(engine.released().is_empty());

    drop(keep_alive);
    drop(isolate);

    assert_eq!(engine.released(), vec![0x50]);
    assert_eq!(bridge.stats().resources_released, 1);
}

#[test]
fn test_external_memory_is_tracked() {
    let api = init();
    let mut isolate = new_isolate();
    let bridge = Bridge::new(api, RecordingEngine::new(), BridgeConfig::default());

    let keep_alive = with_scope(&mut isolate, |scope| {
        let dropped = v8::Object::new(scope);
        bridge.attach(scope, dropped, resource(0x60), 4096).unwrap();

        let kept = v8::Object::new(scope);
        bridge.attach(scope, kept, resource(0x61), 1024).unwrap();
        v8::Global::new(scope, kept)
    });

    assert_eq!(bridge.stats().external_bytes, 5120);

    collect_garbage(api, &mut isolate);
    assert_eq!(bridge.stats().external_bytes, 1024);

    // The credit reaches the isolate at the next safe point
    with_scope(&mut isolate, |scope| bridge.settle(scope));
    assert_eq!(bridge.stats().deferred_handles, 0);

    drop(keep_alive);
}

#[test]
fn test_external_memory_tracking_disabled() {
    let api = init();
    let mut isolate = new_isolate();
    let bridge = Bridge::builder()
        .track_external_memory(false)
        .build(api, RecordingEngine::new());

    let _keep_alive = with_scope(&mut isolate, |scope| {
        let obj = v8::Object::new(scope);
        bridge.attach(scope, obj, resource(0x70), 4096).unwrap();
        v8::Global::new(scope, obj)
    });

    assert_eq!(bridge.stats().external_bytes, 0);
}

#[test]
fn test_offload_policy_releases_through_worker() {
    let api = init();
    let mut isolate = new_isolate();
    let engine = RecordingEngine::new();
    let bridge = Bridge::builder()
        .release_policy(ReleasePolicy::Offload)
        .build(api, engine.clone());

    let mut worker = bridge.take_release_worker().unwrap();
    assert!(bridge.take_release_worker().is_none());

    with_scope(&mut isolate, |scope| {
        for addr in [0x80, 0x81, 0x82] {
            let obj = v8::Object::new(scope);
            bridge.attach(scope, obj, resource(addr), 0).unwrap();
        }
    });

    collect_garbage(api, &mut isolate);

    // Finalizers only queued the resources
    assert!(engine.released().is_empty());
    assert_eq!(bridge.stats().resources_released, 3);

    assert_eq!(worker.drain(), 3);

    let mut released = engine.released();
    released.sort();
    assert_eq!(released, vec![0x80, 0x81, 0x82]);
}

#[tokio::test]
async fn test_release_worker_runs_until_bridge_is_gone() {
    let api = init();
    let mut isolate = new_isolate();
    let engine = RecordingEngine::new();
    let bridge = Bridge::builder()
        .release_policy(ReleasePolicy::Offload)
        .build(api, engine.clone());

    let worker = tokio::spawn(bridge.take_release_worker().unwrap().run());

    with_scope(&mut isolate, |scope| {
        let obj = v8::Object::new(scope);
        bridge.attach(scope, obj, resource(0x90), 0).unwrap();
    });

    collect_garbage(api, &mut isolate);
    drop(bridge);

    assert_eq!(worker.await.unwrap(), 1);
    assert_eq!(engine.released(), vec![0x90]);
}

#[test]
fn test_inline_bridge_has_no_worker() {
    let api = init();
    let bridge = Bridge::new(api, RecordingEngine::new(), BridgeConfig::default());

    assert!(bridge.take_release_worker().is_none());
    assert_eq!(bridge.config().release_policy, ReleasePolicy::Inline);
}
