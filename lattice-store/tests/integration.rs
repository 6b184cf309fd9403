//! Integration Tests for Deep-Reactive State
//!
//! These tests drive proxies from inside effects and check that exactly the
//! right computations re-run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use lattice_store::object::{PropertyDescriptor, PropertyKey, Value};
use lattice_store::reactive::{Effect, Runtime};
use lattice_store::{is_same, unwrap, wrap, Proxy};

fn state(json: serde_json::Value) -> Proxy {
    wrap(Value::from(json), None)
        .as_proxy()
        .cloned()
        .expect("plain JSON objects are proxied")
}

/// Test that an effect re-runs only when a key it read changes.
#[test]
fn effects_rerun_for_keys_they_read() {
    let state = state(json!({ "a": 1, "b": 2 }));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (proxy, log) = (state.clone(), seen.clone());
    let effect = Effect::new(move || {
        log.lock().push(proxy.get("a"));
    });
    assert_eq!(effect.run_count(), 1);

    state.set("b", Value::from(3));
    state.set("c", Value::from(4));
    assert_eq!(effect.run_count(), 1);

    state.set("a", Value::from(1));
    assert_eq!(effect.run_count(), 1);

    state.set("a", Value::from(5));
    assert_eq!(effect.run_count(), 2);

    state.delete("a");
    assert_eq!(effect.run_count(), 3);
    assert_eq!(
        *seen.lock(),
        vec![Some(Value::from(1)), Some(Value::from(5)), None]
    );
}

/// Test that reading a key that does not exist yet still subscribes to it.
#[test]
fn reading_an_absent_key_tracks_its_arrival() {
    let state = state(json!({}));
    let present = Arc::new(AtomicBool::new(false));

    let (proxy, flag) = (state.clone(), present.clone());
    let effect = Effect::new(move || {
        flag.store(proxy.has("later"), Ordering::SeqCst);
    });
    assert!(!present.load(Ordering::SeqCst));

    state.set("later", Value::Null);
    assert!(present.load(Ordering::SeqCst));
    assert_eq!(effect.run_count(), 2);

    state.delete("later");
    assert!(!present.load(Ordering::SeqCst));
}

/// Test that enumeration depends on structure, not on values.
#[test]
fn enumeration_reruns_on_structural_changes_only() {
    let state = state(json!({ "a": 1 }));
    let keys = Arc::new(Mutex::new(Vec::new()));

    let (proxy, out) = (state.clone(), keys.clone());
    let effect = Effect::new(move || {
        *out.lock() = proxy.own_keys();
    });

    state.set("a", Value::from(2));
    assert_eq!(effect.run_count(), 1);

    state.set("b", Value::from(1));
    assert_eq!(effect.run_count(), 2);
    assert_eq!(*keys.lock(), vec![PropertyKey::from("a"), PropertyKey::from("b")]);

    state.delete("a");
    assert_eq!(effect.run_count(), 3);
    assert_eq!(*keys.lock(), vec![PropertyKey::from("b")]);

    // Deleting something that is not there changes nothing.
    state.delete("a");
    assert_eq!(effect.run_count(), 3);
}

/// Test that array length and indices stay consistent for observers.
#[test]
fn array_length_follows_writes() {
    let list = state(json!([1, 2, 3]));
    let length = Arc::new(AtomicUsize::new(0));

    let (proxy, out) = (list.clone(), length.clone());
    let len_effect = Effect::new(move || {
        out.store(proxy.len(), Ordering::SeqCst);
    });
    assert_eq!(length.load(Ordering::SeqCst), 3);

    let proxy = list.clone();
    let last = Arc::new(Mutex::new(None));
    let out = last.clone();
    let index_effect = Effect::new(move || {
        *out.lock() = proxy.get(2);
    });
    assert_eq!(*last.lock(), Some(Value::from(3)));

    list.push(Value::from(4));
    assert_eq!(length.load(Ordering::SeqCst), 4);
    assert_eq!(index_effect.run_count(), 1);

    list.set(PropertyKey::length(), Value::from(2));
    assert_eq!(length.load(Ordering::SeqCst), 2);
    assert_eq!(*last.lock(), None);
    assert_eq!(list.target().own_keys().len(), 3);

    list.set(9, Value::from("x"));
    assert_eq!(length.load(Ordering::SeqCst), 10);
    assert!(len_effect.run_count() >= 4);
}

/// Test that observers never see an index at or past `length`.
#[test]
fn observers_see_consistent_arrays() {
    let list = state(json!([1, 2, 3]));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (proxy, log) = (list.clone(), seen.clone());
    let effect = Effect::new(move || {
        let len = proxy.len();
        log.lock().push((len, proxy.get(len).is_some(), proxy.get(3).is_some()));
    });

    list.push(Value::from(4));
    list.set(PropertyKey::length(), Value::from(2));
    list.delete(1);

    let seen = seen.lock();
    assert!(seen.iter().all(|&(_, past_end, _)| !past_end), "{seen:?}");
    assert_eq!(seen[..3], [(3, false, false), (4, false, true), (2, false, false)]);
    assert_eq!(effect.run_count(), seen.len());
}

/// Test that describing a property tracks the value it reports.
#[test]
fn descriptors_track_their_value() {
    let state = state(json!({ "a": 1 }));
    state.get("a");
    let described = Arc::new(Mutex::new(None));

    let (proxy, out) = (state.clone(), described.clone());
    let effect = Effect::new(move || {
        *out.lock() = proxy.get_own_property("a").and_then(|d| d.value);
    });
    assert_eq!(*described.lock(), Some(Value::from(1)));

    state.set("a", Value::from(2));
    assert_eq!(effect.run_count(), 2);
    assert_eq!(*described.lock(), Some(Value::from(2)));

    state.delete("a");
    assert_eq!(*described.lock(), None);
}

/// Test that an invalid length neither notifies nor corrupts the array.
#[test]
fn invalid_length_is_ignored() {
    let list = state(json!([1, 2, 3]));

    let proxy = list.clone();
    let effect = Effect::new(move || {
        proxy.len();
        proxy.own_keys();
    });

    list.set(PropertyKey::length(), Value::from(-1));
    list.set(PropertyKey::length(), Value::from("abc"));
    assert!(list
        .define_property(PropertyKey::length(), PropertyDescriptor::value(Value::from(0.5)))
        .is_err());

    assert_eq!(effect.run_count(), 1);
    assert_eq!(list.len(), 3);
    assert_eq!(Value::from(list.clone()).to_json(), json!([1, 2, 3]));
}

/// Test that nested objects are proxied once and stay reactive.
#[test]
fn nested_state_is_reactive() {
    let state = state(json!({ "user": { "name": "ada" } }));
    let names = Arc::new(Mutex::new(Vec::new()));

    let (proxy, out) = (state.clone(), names.clone());
    let effect = Effect::new(move || {
        let user = proxy.get("user").and_then(|user| user.as_proxy().cloned());
        out.lock().push(user.and_then(|user| user.get("name")));
    });

    let user = state.get("user").unwrap();
    assert_eq!(state.get("user"), Some(user.clone()));

    user.as_proxy().unwrap().set("name", Value::from("grace"));
    assert_eq!(effect.run_count(), 2);
    assert_eq!(names.lock().last().cloned().flatten(), Some(Value::from("grace")));

    // Storing the proxy back is not a change.
    state.set("user", user.clone());
    assert_eq!(effect.run_count(), 2);
    assert!(is_same(&state.target().get(&"user".into()).unwrap(), &user));
}

/// Test that keys defined through the proxy are visible to observers.
#[test]
fn defined_keys_are_enumerated() {
    let state = state(json!({}));
    let count = Arc::new(AtomicUsize::new(0));

    let (proxy, out) = (state.clone(), count.clone());
    let _effect = Effect::new(move || {
        out.store(proxy.keys().len(), Ordering::SeqCst);
    });

    state
        .define_property("hidden", PropertyDescriptor::data(Value::from(true)))
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!state.target().has(&"hidden".into()));
    assert_eq!(Value::from(state.clone()).to_json(), json!({ "hidden": true }));
}

/// Test that a batch re-runs each affected effect once.
#[test]
fn batched_writes_rerun_once() {
    let state = state(json!({ "a": 0, "b": 0 }));

    let proxy = state.clone();
    let effect = Effect::new(move || {
        proxy.get("a");
        proxy.get("b");
    });

    Runtime::batch(|| {
        state.set("a", Value::from(1));
        state.set("b", Value::from(1));
        assert_eq!(effect.run_count(), 1);
    });
    assert_eq!(effect.run_count(), 2);
}

/// Test identity helpers across raw objects, proxies and copies.
#[test]
fn identity_sees_through_proxies() {
    let state = state(json!({ "a": 1 }));
    let raw = Value::from(state.target().clone());

    assert!(is_same(&raw, &Value::from(state.clone())));
    assert_eq!(unwrap(&raw), Value::from(state.clone()));

    let copy = Value::from(state.target().shallow_copy());
    assert!(!is_same(&copy, &raw));
    assert_eq!(unwrap(&copy), copy);
}

#[cfg(debug_assertions)]
mod ownership {
    use super::*;
    use lattice_store::ownership::{record_owner, take_violations};
    use lattice_store::StoreError;

    /// Test that state created by one effect and mutated by another is
    /// reported, without blocking the write.
    #[test]
    fn foreign_mutation_is_reported() {
        let slot: Arc<Mutex<Option<Proxy>>> = Arc::new(Mutex::new(None));

        let out = slot.clone();
        let _creator = Effect::new(move || {
            let mut out = out.lock();
            if out.is_none() {
                *out = Some(state(json!({ "n": 0 })));
            }
        });
        let owned = slot.lock().clone().unwrap();
        take_violations();

        let proxy = owned.clone();
        let intruder = Effect::new_lazy(move || {
            proxy.set("n", Value::from(1));
        });
        intruder.execute();

        assert_eq!(owned.get("n"), Some(Value::from(1)));
        assert_eq!(
            take_violations(),
            vec![StoreError::OwnershipViolation {
                key: Some(PropertyKey::from("n")),
                owner: intruder.subscriber_id(),
            }]
        );

        record_owner(owned.metadata(), intruder.subscriber_id());
        intruder.execute();
        assert!(take_violations().is_empty());
    }

    /// Test that nested state defers to the owners of its ancestors.
    #[test]
    fn nested_state_inherits_owners() {
        let root = state(json!({ "inner": { "n": 0 } }));
        let inner = root.get("inner").unwrap().as_proxy().cloned().unwrap();
        take_violations();

        let proxy = inner.clone();
        let _writer = Effect::new(move || {
            proxy.set("n", Value::from(1));
        });
        assert!(take_violations().is_empty());
    }
}
