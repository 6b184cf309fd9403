//! Host Object Model
//!
//! The objects that deep-reactive state wraps: keyed property bags with
//! descriptors, a prototype tag, a frozen flag and a hidden state slot.
//!
//! # Arrays
//!
//! An object with [`Prototype::Array`] keeps a non-enumerable,
//! non-configurable `length` data property. Writing an index at or past the
//! end extends it; writing `length` drops every index at or above the new
//! length.
//!
//! # Key order
//!
//! [`ObjectRef::own_keys`] lists index keys in ascending order, then string
//! keys in insertion order.
//!
//! # The state slot
//!
//! Each object has one slot that is not a property: it never shows up in
//! keys or descriptors. A proxy stores its [`Metadata`] there. The slot is
//! copied by [`ObjectRef::shallow_copy`] like any reflective key copy would,
//! which is why the proxy factory checks that a record really belongs to the
//! object carrying it.

mod descriptor;
mod key;
mod value;

pub use descriptor::{Getter, PropertyDescriptor, Setter};
pub use key::PropertyKey;
pub use value::Value;

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::proxy::Metadata;

/// The prototype an object was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prototype {
    /// The bare object prototype.
    Object,
    /// The bare array prototype.
    Array,
    /// No prototype at all.
    Null,
    /// An instance of a named class.
    Class(Arc<str>),
}

impl Prototype {
    /// Only bare objects and arrays are eligible for proxying.
    pub fn is_plain(&self) -> bool {
        matches!(self, Self::Object | Self::Array)
    }
}

#[derive(Clone)]
enum Property {
    Data {
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
        enumerable: bool,
        configurable: bool,
    },
}

impl Property {
    fn data(value: Value) -> Self {
        Self::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    fn length(len: u32) -> Self {
        Self::Data {
            value: Value::from(len),
            writable: true,
            enumerable: false,
            configurable: false,
        }
    }

    fn configurable(&self) -> bool {
        match self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => *configurable,
        }
    }

    fn descriptor(&self) -> PropertyDescriptor {
        match self {
            Self::Data {
                value,
                writable,
                enumerable,
                configurable,
            } => PropertyDescriptor {
                value: Some(value.clone()),
                writable: Some(*writable),
                enumerable: Some(*enumerable),
                configurable: Some(*configurable),
                ..PropertyDescriptor::default()
            },
            Self::Accessor {
                get,
                set,
                enumerable,
                configurable,
            } => PropertyDescriptor {
                enumerable: Some(*enumerable),
                configurable: Some(*configurable),
                get: get.clone(),
                set: set.clone(),
                ..PropertyDescriptor::default()
            },
        }
    }
}

struct ObjectData {
    prototype: Prototype,
    frozen: bool,
    properties: IndexMap<PropertyKey, Property>,
    state: Option<Arc<Metadata>>,
}

impl ObjectData {
    fn is_array(&self) -> bool {
        self.prototype == Prototype::Array
    }

    fn array_length(&self) -> u32 {
        match self.properties.get(&PropertyKey::length()) {
            Some(Property::Data { value, .. }) => value.as_array_length().unwrap_or(0),
            _ => 0,
        }
    }

    fn store_length(&mut self, len: u32) {
        if let Some(Property::Data { value, .. }) = self.properties.get_mut(&PropertyKey::length()) {
            *value = Value::from(len);
        }
    }

    fn set_length(&mut self, value: &Value) -> bool {
        let Some(len) = value.as_array_length() else {
            return false;
        };
        if let Some(Property::Data { writable: false, .. }) = self.properties.get(&PropertyKey::length()) {
            return false;
        }
        self.properties
            .retain(|key, _| key.as_index().map_or(true, |i| i < len));
        self.store_length(len);
        true
    }

    fn extend_length(&mut self, key: &PropertyKey) {
        if let Some(i) = key.as_index() {
            if self.is_array() && i >= self.array_length() {
                self.store_length(i + 1);
            }
        }
    }
}

/// Shared handle to a host object. Clones refer to the same object.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<ObjectData>>);

/// Non-owning handle to a host object.
#[derive(Clone)]
pub(crate) struct WeakObjectRef(Weak<RwLock<ObjectData>>);

impl WeakObjectRef {
    pub(crate) fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }

    pub(crate) fn refers_to(&self, object: &ObjectRef) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&object.0))
    }
}

impl ObjectRef {
    /// Create an empty object with the given prototype.
    pub fn with_prototype(prototype: Prototype) -> Self {
        let mut properties = IndexMap::new();
        if prototype == Prototype::Array {
            properties.insert(PropertyKey::length(), Property::length(0));
        }
        Self(Arc::new(RwLock::new(ObjectData {
            prototype,
            frozen: false,
            properties,
            state: None,
        })))
    }

    /// Create an empty plain object.
    pub fn plain() -> Self {
        Self::with_prototype(Prototype::Object)
    }

    /// Create an array holding the given elements.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        let object = Self::with_prototype(Prototype::Array);
        {
            let mut data = object.0.write();
            let mut len = 0u32;
            for item in items {
                data.properties.insert(PropertyKey::Index(len), Property::data(item));
                len += 1;
            }
            data.store_length(len);
        }
        object
    }

    /// Create an empty instance of a named class.
    pub fn instance(class: &str) -> Self {
        Self::with_prototype(Prototype::Class(Arc::from(class)))
    }

    /// Check if two handles refer to the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the object, stable for its lifetime.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Arc::downgrade(&self.0))
    }

    pub fn prototype(&self) -> Prototype {
        self.0.read().prototype.clone()
    }

    /// Replace the prototype. Fails on frozen objects.
    pub fn set_prototype(&self, prototype: Prototype) -> bool {
        let mut data = self.0.write();
        if data.frozen {
            return false;
        }
        data.prototype = prototype;
        true
    }

    /// Make every property read-only and forbid additions and removals.
    pub fn freeze(&self) {
        let mut data = self.0.write();
        data.frozen = true;
        for property in data.properties.values_mut() {
            match property {
                Property::Data {
                    writable,
                    configurable,
                    ..
                } => {
                    *writable = false;
                    *configurable = false;
                }
                Property::Accessor { configurable, .. } => *configurable = false,
            }
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.0.read().frozen
    }

    /// Check if the object has an own property with this key.
    pub fn has(&self, key: &PropertyKey) -> bool {
        self.0.read().properties.contains_key(key)
    }

    /// Read a property. Accessors are invoked without holding the object.
    pub fn get(&self, key: &PropertyKey) -> Option<Value> {
        let getter = {
            let data = self.0.read();
            match data.properties.get(key)? {
                Property::Data { value, .. } => return Some(value.clone()),
                Property::Accessor { get, .. } => get.clone()?,
            }
        };
        getter()
    }

    /// Write a property, creating it if absent.
    ///
    /// Returns `false` when the write is refused: read-only property, frozen
    /// object, accessor without setter, or an invalid array length.
    pub fn set(&self, key: &PropertyKey, value: Value) -> bool {
        let mut data = self.0.write();

        if data.is_array() && key.is_length() {
            return data.set_length(&value);
        }

        if let Some(Property::Accessor { set, .. }) = data.properties.get(key) {
            let setter = set.clone();
            drop(data);
            return match setter {
                Some(setter) => {
                    setter(value);
                    true
                }
                None => false,
            };
        }

        match data.properties.get_mut(key) {
            Some(Property::Data {
                value: slot,
                writable,
                ..
            }) => {
                if !*writable {
                    return false;
                }
                *slot = value;
                true
            }
            Some(Property::Accessor { .. }) => false,
            None => {
                if data.frozen {
                    return false;
                }
                data.properties.insert(key.clone(), Property::data(value));
                data.extend_length(key);
                true
            }
        }
    }

    /// Remove a property. Removing an absent key succeeds; removing a
    /// non-configurable one does not.
    pub fn delete(&self, key: &PropertyKey) -> bool {
        let mut data = self.0.write();
        match data.properties.get(key) {
            None => true,
            Some(property) if data.frozen || !property.configurable() => false,
            Some(_) => {
                data.properties.shift_remove(key);
                true
            }
        }
    }

    /// Own property keys: indices ascending, then names in insertion order.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let data = self.0.read();
        let mut indices: Vec<u32> = data.properties.keys().filter_map(PropertyKey::as_index).collect();
        indices.sort_unstable();

        indices
            .into_iter()
            .map(PropertyKey::Index)
            .chain(
                data.properties
                    .keys()
                    .filter(|key| key.as_index().is_none())
                    .cloned(),
            )
            .collect()
    }

    /// Describe an own property.
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        self.0.read().properties.get(key).map(Property::descriptor)
    }

    /// Define or reconfigure an own property.
    ///
    /// Unspecified flags default to those of the existing property, or to
    /// `false` for a new one. Non-configurable properties only accept value
    /// changes, and only while writable.
    pub fn define_own_property(&self, key: &PropertyKey, descriptor: PropertyDescriptor) -> bool {
        let mut data = self.0.write();
        let existing = data.properties.get(key).cloned();

        if existing.is_none() && data.frozen {
            return false;
        }

        if let Some(existing) = &existing {
            if !existing.configurable() {
                let value_only = !descriptor.is_accessor()
                    && descriptor.configurable != Some(true)
                    && descriptor.enumerable.is_none()
                    && descriptor.writable != Some(true);
                match existing {
                    Property::Data { writable: true, .. } if value_only => {}
                    _ => return false,
                }
                if data.is_array() && key.is_length() {
                    if let Some(value) = &descriptor.value {
                        if !data.set_length(value) {
                            return false;
                        }
                    }
                    if descriptor.writable == Some(false) {
                        if let Some(Property::Data { writable, .. }) = data.properties.get_mut(key) {
                            *writable = false;
                        }
                    }
                    return true;
                }
            }
        }

        let (old_enumerable, old_configurable) = match &existing {
            Some(Property::Data {
                enumerable,
                configurable,
                ..
            })
            | Some(Property::Accessor {
                enumerable,
                configurable,
                ..
            }) => (*enumerable, *configurable),
            None => (false, false),
        };
        let enumerable = descriptor.enumerable.unwrap_or(old_enumerable);
        let configurable = descriptor.configurable.unwrap_or(old_configurable);

        let property = if descriptor.is_accessor() {
            Property::Accessor {
                get: descriptor.get,
                set: descriptor.set,
                enumerable,
                configurable,
            }
        } else {
            let (old_value, old_writable) = match existing {
                Some(Property::Data { value, writable, .. }) => (value, writable),
                _ => (Value::Null, false),
            };
            Property::Data {
                value: descriptor.value.unwrap_or(old_value),
                writable: descriptor.writable.unwrap_or(old_writable),
                enumerable,
                configurable,
            }
        };

        data.properties.insert(key.clone(), property);
        data.extend_length(key);
        true
    }

    /// Copy every own property, and the state slot, into a new object with
    /// the same prototype.
    pub fn shallow_copy(&self) -> ObjectRef {
        let data = self.0.read();
        Self(Arc::new(RwLock::new(ObjectData {
            prototype: data.prototype.clone(),
            frozen: false,
            properties: data.properties.clone(),
            state: data.state.clone(),
        })))
    }

    /// The record in the state slot, whoever it belongs to.
    pub(crate) fn state(&self) -> Option<Arc<Metadata>> {
        self.0.read().state.clone()
    }

    /// Return this object's own record, creating it with `make` if the
    /// object is eligible. The check and the install happen under one lock.
    ///
    /// `make` receives whether the object is an array and must not touch
    /// this object.
    pub(crate) fn attach_state(&self, make: impl FnOnce(bool) -> Arc<Metadata>) -> Option<Arc<Metadata>> {
        let mut data = self.0.write();
        if let Some(state) = &data.state {
            if state.belongs_to(self) {
                return Some(state.clone());
            }
        }
        if data.frozen || !data.prototype.is_plain() {
            return None;
        }
        let state = make(data.is_array());
        data.state = Some(state.clone());
        Some(state)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.read();
        f.debug_struct("ObjectRef")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("prototype", &data.prototype)
            .field("frozen", &data.frozen)
            .field("len", &data.properties.len())
            .finish()
    }
}
