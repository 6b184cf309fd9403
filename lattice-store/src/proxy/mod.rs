//! Deep Reactive Proxies
//!
//! A [`Proxy`] stands in for a plain host object or array. It answers every
//! property operation the way the object itself would, while keeping one
//! [`Signal`] per property so that computations reading a property re-run
//! exactly when that property changes.
//!
//! # How Proxies Work
//!
//! 1. [`wrap`] attaches a [`Metadata`] record to the object's state slot
//!    and returns the proxy. Wrapping again returns the same proxy.
//!
//! 2. Cells are created the first time a key is touched, not up front.
//!    Values stored in or first read from a cell are wrapped too, so nested
//!    objects become reactive on demand.
//!
//! 3. A deleted property keeps its cell, which now holds a tombstone.
//!
//! 4. A separate structural version cell changes whenever a key appears or
//!    disappears. Key enumeration depends on it; value overwrites do not
//!    touch it.
//!
//! Properties that are read-only or accessors on the target get no cell and
//! are forwarded to it.
//!
//! [`Signal`]: crate::reactive::Signal

mod factory;
mod metadata;
#[cfg(feature = "python")]
mod python;

pub use factory::{is_same, unwrap, wrap};
pub use metadata::{Metadata, ObjectKind, Slot};
#[cfg(feature = "python")]
pub use python::PyState;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectRef, PropertyDescriptor, PropertyKey, Prototype, Value};
use crate::ownership;
use crate::reactive::{ReactiveContext, Runtime, Signal};

/// Reactive wrapper around a plain object or array.
///
/// Handles are cheap to clone and compare equal when they wrap the same
/// target.
#[derive(Clone)]
pub struct Proxy {
    target: ObjectRef,
    metadata: Arc<Metadata>,
}

impl Proxy {
    pub(crate) fn new(target: ObjectRef, metadata: Arc<Metadata>) -> Self {
        Self { target, metadata }
    }

    /// The raw object behind this proxy.
    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }

    pub fn is_array(&self) -> bool {
        self.metadata.is_array()
    }

    /// Current structural version, without tracking.
    pub fn structural_version(&self) -> u64 {
        self.metadata.structural_version()
    }

    /// The existing cell for `key`, or a new one if the key is absent or a
    /// writable data property.
    fn cell(&self, key: &PropertyKey) -> Option<Signal<Slot>> {
        self.metadata.cell(key).or_else(|| self.create_cell(key))
    }

    fn create_cell(&self, key: &PropertyKey) -> Option<Signal<Slot>> {
        let slot = match self.target.get_own_property(key) {
            None => Slot::Tombstone,
            Some(descriptor) if !descriptor.is_accessor() && descriptor.writable == Some(true) => {
                let value = descriptor.value.unwrap_or(Value::Null);
                Slot::Present(wrap(value, Some(&self.metadata)))
            }
            Some(_) => return None,
        };
        Some(self.metadata.insert_cell(key.clone(), slot))
    }

    /// Read a property. `None` means the property does not exist.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Option<Value> {
        let key = key.into();
        match self.cell(&key) {
            Some(cell) => cell.get().into_value(),
            None => self.target.get(&key),
        }
    }

    /// Write a property.
    ///
    /// Dependents re-run once the write is complete: cell, array
    /// bookkeeping, target and structural version all agree by then.
    /// Writing something other than a valid array length to an array's
    /// `length` changes nothing.
    pub fn set(&self, key: impl Into<PropertyKey>, value: Value) {
        let key = key.into();
        if !self.accepts(&key, &value) {
            return;
        }
        Runtime::batch(|| {
            let cell = self.cell(&key);
            self.assign(key, cell, value, true);
        });
    }

    /// Define a property through the proxy.
    ///
    /// Only plain value descriptors are accepted: a cell cannot represent an
    /// accessor or a read-only, hidden or fixed property. The value lives in
    /// the cell only; the target is left untouched.
    pub fn define_property(
        &self,
        key: impl Into<PropertyKey>,
        descriptor: PropertyDescriptor,
    ) -> StoreResult<()> {
        let key = key.into();
        if !descriptor.is_plain_value() {
            debug!(%key, "rejected property descriptor");
            return Err(StoreError::UnsupportedDescriptor { key });
        }
        let Some(value) = descriptor.value else {
            return Err(StoreError::UnsupportedDescriptor { key });
        };
        if !self.accepts(&key, &value) {
            return Err(StoreError::UnsupportedDescriptor { key });
        }

        Runtime::batch(|| self.define_cell(key, value));
        Ok(())
    }

    fn define_cell(&self, key: PropertyKey, value: Value) {
        let cell = match self.metadata.cell(&key) {
            Some(cell) => cell,
            None => {
                let slot = match self.target.get_own_property(&key) {
                    Some(existing) => Slot::Present(wrap(
                        existing.value.unwrap_or(Value::Null),
                        Some(&self.metadata),
                    )),
                    None => Slot::Tombstone,
                };
                self.metadata.insert_cell(key.clone(), slot)
            }
        };
        self.assign(key, Some(cell), value, false);
    }

    /// An array's `length` only takes valid lengths.
    fn accepts(&self, key: &PropertyKey, value: &Value) -> bool {
        if self.metadata.is_array() && key.is_length() && value.as_array_length().is_none() {
            debug!(%key, ?value, "rejected invalid array length");
            return false;
        }
        true
    }

    fn assign(&self, key: PropertyKey, cell: Option<Signal<Slot>>, value: Value, store: bool) {
        let existed = match &cell {
            Some(cell) => cell.get_untracked().is_present(),
            None => self.target.has(&key),
        };

        ownership::check(&self.metadata, Some(&key));

        if let Some(cell) = &cell {
            cell.set(Slot::Present(wrap(value.clone(), Some(&self.metadata))));
        }

        let mut removed = false;
        if self.metadata.is_array() {
            if key.is_length() {
                removed = value.as_array_length().is_some_and(|len| self.truncate(len));
            } else if let Some(index) = key.as_index().filter(|_| !existed) {
                self.extend(index);
            }
        }

        if store {
            self.target.set(&key, value);
        }

        if !existed || removed {
            self.metadata.bump_version();
        }
    }

    /// Tombstone every index at or above `len`. Returns whether any index
    /// stopped existing.
    fn truncate(&self, len: u32) -> bool {
        let beyond = |key: &PropertyKey| key.as_index().is_some_and(|i| i >= len);
        let mut removed = false;

        for key in self.target.own_keys().into_iter().filter(|key| beyond(key)) {
            if self.metadata.cell(&key).is_none() {
                self.metadata.insert_cell(key, Slot::Tombstone);
                removed = true;
            }
        }

        for (key, cell) in self.metadata.cells() {
            if beyond(&key) && cell.set(Slot::Tombstone) {
                removed = true;
            }
        }
        removed
    }

    /// Raise `length` to cover a newly added `index`.
    fn extend(&self, index: u32) {
        let Some(length) = self.cell(&PropertyKey::length()) else {
            return;
        };
        if let Slot::Present(current) = length.get_untracked() {
            if current.as_array_length().is_some_and(|len| len <= index) {
                length.set(Slot::Present(Value::from(index + 1)));
            }
        }
    }

    /// Delete a property. Returns whether it existed.
    ///
    /// Non-configurable properties (such as an array's `length`) are not
    /// deleted and report `false`.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        Runtime::batch(|| self.remove(key))
    }

    fn remove(&self, key: PropertyKey) -> bool {
        let raw = self.target.get_own_property(&key);
        if raw.as_ref().is_some_and(|d| d.configurable == Some(false)) {
            debug!(%key, "refused to delete a non-configurable property");
            return false;
        }

        let cell = self.metadata.cell(&key);
        let existed = match &cell {
            Some(cell) => cell.get_untracked().is_present(),
            None => raw.is_some(),
        };
        if existed {
            ownership::check(&self.metadata, Some(&key));
        }

        match cell {
            Some(cell) => {
                cell.set(Slot::Tombstone);
            }
            None if raw.is_some() => {
                self.metadata.insert_cell(key.clone(), Slot::Tombstone);
            }
            None => {}
        }
        self.target.delete(&key);

        if existed {
            self.metadata.bump_version();
        }
        existed
    }

    /// Check whether a property exists.
    ///
    /// Inside a running computation the check is tracked, so the
    /// computation re-runs when the property appears or disappears.
    pub fn has(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        let cell = match self.metadata.cell(&key) {
            Some(cell) => Some(cell),
            None if ReactiveContext::is_active() => self.create_cell(&key),
            None => None,
        };
        match cell {
            Some(cell) => cell.get().is_present(),
            None => self.target.has(&key),
        }
    }

    /// Describe an own property.
    ///
    /// Data descriptors carry the cell's current value. A property that
    /// only exists in a cell is described as writable, enumerable and
    /// configurable.
    pub fn get_own_property(&self, key: impl Into<PropertyKey>) -> Option<PropertyDescriptor> {
        let key = key.into();
        let cell = self.metadata.cell(&key);
        match self.target.get_own_property(&key) {
            Some(mut descriptor) if descriptor.value.is_some() => {
                if let Some(cell) = cell {
                    descriptor.value = Some(cell.get().into_value()?);
                }
                Some(descriptor)
            }
            Some(descriptor) => Some(descriptor),
            None => cell?.get().into_value().map(PropertyDescriptor::data),
        }
    }

    /// Own keys: the target's keys minus deleted ones, then keys that exist
    /// only in cells, in the order their cells were created.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.metadata.track_structure();
        let cells = self.metadata.cells();

        let mut keys: Vec<PropertyKey> = self
            .target
            .own_keys()
            .into_iter()
            .filter(|key| cells.get(key).map_or(true, |cell| cell.get_untracked().is_present()))
            .collect();

        for (key, cell) in &cells {
            if cell.get_untracked().is_present() && !self.target.has(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    /// Enumerable own keys.
    pub fn keys(&self) -> Vec<PropertyKey> {
        self.own_keys()
            .into_iter()
            .filter(|key| {
                self.get_own_property(key)
                    .is_some_and(|descriptor| descriptor.enumerable != Some(false))
            })
            .collect()
    }

    /// Array length, or the number of enumerable keys of an object.
    pub fn len(&self) -> usize {
        if self.is_array() {
            self.get(PropertyKey::length())
                .and_then(|len| len.as_array_length())
                .unwrap_or(0) as usize
        } else {
            self.keys().len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append to an array-kind proxy. Returns the new length.
    pub fn push(&self, value: Value) -> usize {
        let len = self.len();
        self.set(len, value);
        len + 1
    }

    pub fn prototype(&self) -> Prototype {
        self.target.prototype()
    }

    /// Prototypes of proxied objects are fixed.
    pub fn set_prototype(&self, prototype: Prototype) -> StoreResult<()> {
        debug!(?prototype, "refused to change the prototype of proxied state");
        Err(StoreError::PrototypeFixed)
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.target.ptr_eq(&other.target)
    }
}

impl Eq for Proxy {}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("target", &format_args!("{:#x}", self.target.addr()))
            .field("metadata", &self.metadata)
            .finish()
    }
}
