//! Ownership audit for debug builds.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use smallvec::{smallvec, SmallVec};
use tracing::warn;

use crate::error::StoreError;
use crate::object::{PropertyKey, Value};
use crate::proxy::{Metadata, Slot};
use crate::reactive::{ReactiveContext, SubscriberId};

type Owners = SmallVec<[SubscriberId; 4]>;

thread_local! {
    static VIOLATIONS: RefCell<Vec<StoreError>> = const { RefCell::new(Vec::new()) };
}

/// Where a proxied object was first nested and who may mutate it.
pub struct Provenance {
    state: RwLock<State>,
}

struct State {
    parent: Option<Weak<Metadata>>,
    /// `None`: anyone may mutate.
    owners: Option<Owners>,
}

impl Provenance {
    pub(crate) fn new(parent: Option<&Arc<Metadata>>) -> Self {
        let owners = match parent {
            None => ReactiveContext::current_subscriber().map(|owner| smallvec![owner]),
            Some(_) => Some(Owners::new()),
        };
        Self {
            state: RwLock::new(State {
                parent: parent.map(Arc::downgrade),
                owners,
            }),
        }
    }

    /// The record this one was last nested under.
    pub fn parent(&self) -> Option<Arc<Metadata>> {
        self.state.read().parent.as_ref().and_then(Weak::upgrade)
    }

    /// Owners recorded on this record itself. `None` means unrestricted;
    /// ancestors' owners are not included.
    pub fn owners(&self) -> Option<Vec<SubscriberId>> {
        self.state.read().owners.as_ref().map(|owners| owners.to_vec())
    }
}

impl fmt::Debug for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provenance")
            .field("has_parent", &self.parent().is_some())
            .field("owners", &self.owners())
            .finish()
    }
}

/// Let `owner` mutate the object behind `metadata` and everything
/// currently nested in it.
pub fn record_owner(metadata: &Arc<Metadata>, owner: SubscriberId) {
    let mut visited = Vec::new();
    record_owner_in(metadata, owner, &mut visited);
}

fn record_owner_in(metadata: &Arc<Metadata>, owner: SubscriberId, visited: &mut Vec<*const Metadata>) {
    let ptr = Arc::as_ptr(metadata);
    if visited.contains(&ptr) {
        return;
    }
    visited.push(ptr);

    if let Some(owners) = &mut metadata.provenance.state.write().owners {
        if !owners.contains(&owner) {
            owners.push(owner);
        }
    }

    for cell in metadata.cells().values() {
        if let Slot::Present(Value::Proxy(child)) = cell.get_untracked() {
            record_owner_in(child.metadata(), owner, visited);
        }
    }
}

/// Give `to` every owner of `from` and of `from`'s ancestors.
pub fn widen(from: &Arc<Metadata>, to: &Metadata) {
    if to.provenance.state.read().owners.is_none() {
        return;
    }

    let mut merged = Owners::new();
    let mut unrestricted = false;
    let mut visited: Vec<*const Metadata> = Vec::new();
    let mut current = Some(from.clone());

    while let Some(metadata) = current {
        if visited.contains(&Arc::as_ptr(&metadata)) {
            break;
        }
        visited.push(Arc::as_ptr(&metadata));

        let state = metadata.provenance.state.read();
        match &state.owners {
            None => {
                unrestricted = true;
                break;
            }
            Some(owners) => {
                for owner in owners {
                    if !merged.contains(owner) {
                        merged.push(*owner);
                    }
                }
            }
        }
        current = state.parent.as_ref().and_then(Weak::upgrade);
    }

    let mut state = to.provenance.state.write();
    if unrestricted {
        state.owners = None;
    } else if let Some(owners) = &mut state.owners {
        for owner in merged {
            if !owners.contains(&owner) {
                owners.push(owner);
            }
        }
    }
}

fn has_owner(metadata: &Arc<Metadata>, owner: SubscriberId) -> bool {
    let mut visited: Vec<*const Metadata> = Vec::new();
    let mut current = Some(metadata.clone());

    while let Some(metadata) = current {
        if visited.contains(&Arc::as_ptr(&metadata)) {
            return false;
        }
        visited.push(Arc::as_ptr(&metadata));

        let state = metadata.provenance.state.read();
        match &state.owners {
            None => return true,
            Some(owners) if owners.contains(&owner) => return true,
            Some(_) => {}
        }
        current = state.parent.as_ref().and_then(Weak::upgrade);
    }
    false
}

/// Report the running computation if it may not mutate `metadata`.
pub fn check(metadata: &Arc<Metadata>, key: Option<&PropertyKey>) {
    let Some(owner) = ReactiveContext::current_subscriber() else {
        return;
    };
    if has_owner(metadata, owner) {
        return;
    }

    let violation = StoreError::OwnershipViolation {
        key: key.cloned(),
        owner,
    };
    warn!(owner = owner.raw(), "{violation}");
    VIOLATIONS.with(|violations| violations.borrow_mut().push(violation));
}

/// Drain the violations reported on this thread.
pub fn take_violations() -> Vec<StoreError> {
    VIOLATIONS.with(|violations| std::mem::take(&mut *violations.borrow_mut()))
}

/// Re-parent an existing record that is being stored under `parent`.
pub(crate) fn adopt(metadata: &Arc<Metadata>, parent: Option<&Arc<Metadata>>) {
    let Some(parent) = parent else {
        return;
    };
    if parent_is(metadata, parent) {
        return;
    }
    widen(parent, metadata);
    metadata.provenance.state.write().parent = Some(Arc::downgrade(parent));
}

fn parent_is(metadata: &Metadata, parent: &Arc<Metadata>) -> bool {
    metadata
        .provenance
        .state
        .read()
        .parent
        .as_ref()
        .is_some_and(|current| std::ptr::eq(current.as_ptr(), Arc::as_ptr(parent)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;
    use crate::proxy::wrap;

    fn root() -> Arc<Metadata> {
        wrap(Value::from(ObjectRef::plain()), None)
            .as_proxy()
            .map(|proxy| proxy.metadata().clone())
            .unwrap()
    }

    #[test]
    fn roots_outside_a_computation_are_unrestricted() {
        let metadata = root();
        assert_eq!(metadata.provenance.owners(), None);
    }

    #[test]
    fn roots_are_owned_by_their_creator() {
        let owner = SubscriberId::new();
        let metadata = {
            let _ctx = ReactiveContext::enter(owner);
            root()
        };
        assert_eq!(metadata.provenance.owners(), Some(vec![owner]));
    }

    #[test]
    fn widening_merges_ancestor_owners() {
        let (a, b) = (SubscriberId::new(), SubscriberId::new());
        let (from, to) = {
            let _ctx = ReactiveContext::enter(a);
            (root(), root())
        };
        record_owner(&from, b);

        widen(&from, &to);
        assert_eq!(to.provenance.owners(), Some(vec![a, b]));
    }

    #[test]
    fn checks_report_foreign_mutations() {
        let (owner, intruder) = (SubscriberId::new(), SubscriberId::new());
        let metadata = {
            let _ctx = ReactiveContext::enter(owner);
            root()
        };
        take_violations();

        {
            let _ctx = ReactiveContext::enter(owner);
            check(&metadata, None);
        }
        assert!(take_violations().is_empty());

        {
            let _ctx = ReactiveContext::enter(intruder);
            check(&metadata, Some(&PropertyKey::from("x")));
        }
        assert_eq!(
            take_violations(),
            vec![StoreError::OwnershipViolation {
                key: Some(PropertyKey::from("x")),
                owner: intruder,
            }]
        );
    }
}
