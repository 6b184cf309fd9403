//! Creating proxies and comparing proxied values.

use std::sync::Arc;

use tracing::trace;

use super::{Metadata, Proxy};
use crate::object::{ObjectRef, Value};
use crate::ownership;

/// Make a value reactive.
///
/// - Primitives, frozen objects and objects whose prototype is not the bare
///   object or array prototype are returned unchanged.
/// - An object that already has a proxy gets that same proxy back, and a
///   proxy is returned as is. When `parent` is given, the record is
///   re-parented under it for the ownership audit.
/// - A state slot copied over from another object is ignored and the object
///   gets a proxy of its own.
///
/// `parent` is the record of the object the value is being stored in, or
/// `None` for a root.
pub fn wrap(value: Value, parent: Option<&Arc<Metadata>>) -> Value {
    match value {
        Value::Proxy(proxy) => {
            ownership::adopt(proxy.metadata(), parent);
            Value::Proxy(proxy)
        }
        Value::Object(object) => match wrap_object(&object, parent) {
            Some(proxy) => Value::Proxy(proxy),
            None => Value::Object(object),
        },
        other => other,
    }
}

fn wrap_object(object: &ObjectRef, parent: Option<&Arc<Metadata>>) -> Option<Proxy> {
    if object.is_frozen() {
        return None;
    }

    if let Some(metadata) = object.state() {
        if metadata.belongs_to(object) {
            ownership::adopt(&metadata, parent);
            return Some(Proxy::new(object.clone(), metadata));
        }
        trace!(object = object.addr(), "ignoring state copied from another object");
    }

    let weak = object.downgrade();
    let mut created = false;
    let metadata = object.attach_state(|is_array| {
        created = true;
        Metadata::new(weak, is_array, parent)
    })?;

    if created {
        trace!(object = object.addr(), array = metadata.is_array(), "created proxy");
    } else {
        ownership::adopt(&metadata, parent);
    }
    Some(Proxy::new(object.clone(), metadata))
}

/// The proxy for a value that has one, otherwise the value itself.
///
/// Only a record that was created for the object counts; a copied state
/// slot does not make two objects the same.
pub fn unwrap(value: &Value) -> Value {
    if let Value::Object(object) = value {
        if let Some(metadata) = object.state() {
            if metadata.belongs_to(object) {
                return Value::Proxy(Proxy::new(object.clone(), metadata));
            }
        }
    }
    value.clone()
}

/// Identity comparison that sees through proxies: a proxy equals its
/// target, and two handles to the same proxy are equal.
pub fn is_same(a: &Value, b: &Value) -> bool {
    unwrap(a) == unwrap(b)
}
