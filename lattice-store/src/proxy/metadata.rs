//! Per-object proxy bookkeeping.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::object::{ObjectRef, PropertyKey, Value, WeakObjectRef};
use crate::ownership::Provenance;
use crate::reactive::Signal;

/// Whether a proxied object is an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Object,
    Array,
}

/// The content of a property cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Present(Value),
    /// The property does not exist. Deleting writes this instead of
    /// removing the cell, so readers of that one property are notified.
    Tombstone,
}

impl Slot {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Present(value) => Some(value),
            Self::Tombstone => None,
        }
    }
}

/// Bookkeeping for one proxied object.
///
/// Exactly one record exists per target; it lives in the target's state slot
/// and is never replaced. Cells are created lazily and never removed, and a
/// cell always belongs to the key it was created for.
pub struct Metadata {
    cells: RwLock<IndexMap<PropertyKey, Signal<Slot>>>,
    /// Bumped whenever a key appears or disappears.
    version: Signal<u64>,
    kind: ObjectKind,
    target: WeakObjectRef,
    pub(crate) provenance: Provenance,
}

impl Metadata {
    pub(crate) fn new(target: WeakObjectRef, is_array: bool, parent: Option<&Arc<Metadata>>) -> Arc<Self> {
        Arc::new(Self {
            cells: RwLock::new(IndexMap::new()),
            version: Signal::new(0),
            kind: if is_array {
                ObjectKind::Array
            } else {
                ObjectKind::Object
            },
            target,
            provenance: Provenance::new(parent),
        })
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn is_array(&self) -> bool {
        self.kind == ObjectKind::Array
    }

    /// Check if this record was created for `object`, as opposed to having
    /// been copied onto it.
    pub(crate) fn belongs_to(&self, object: &ObjectRef) -> bool {
        self.target.refers_to(object)
    }

    /// The raw object this record was created for.
    pub fn target(&self) -> Option<ObjectRef> {
        self.target.upgrade()
    }

    /// The cell for `key`, if one was created.
    pub fn cell(&self, key: &PropertyKey) -> Option<Signal<Slot>> {
        self.cells.read().get(key).cloned()
    }

    /// Create the cell for `key`. If another caller got there first, theirs
    /// is kept and returned.
    pub(crate) fn insert_cell(&self, key: PropertyKey, slot: Slot) -> Signal<Slot> {
        self.cells
            .write()
            .entry(key)
            .or_insert_with(|| Signal::new(slot))
            .clone()
    }

    /// Snapshot of every cell in creation order.
    pub fn cells(&self) -> IndexMap<PropertyKey, Signal<Slot>> {
        self.cells.read().clone()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.read().len()
    }

    /// Current structural version, without tracking.
    pub fn structural_version(&self) -> u64 {
        self.version.get_untracked()
    }

    /// Read the structural version as a dependency of the running
    /// computation.
    pub(crate) fn track_structure(&self) -> u64 {
        self.version.get()
    }

    pub(crate) fn bump_version(&self) {
        self.version.update(|v| v + 1);
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("kind", &self.kind)
            .field("cells", &self.cell_count())
            .field("version", &self.structural_version())
            .finish()
    }
}
