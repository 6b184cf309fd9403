//! Signal Implementation
//!
//! A Signal is the reactive cell every proxy property is stored in.
//!
//! 1. Reading a signal inside a running computation registers that
//!    computation with the [`Runtime`].
//! 2. Writing a different value bumps the signal's version and schedules the
//!    registered computations. Writing an equal value does nothing.
//!
//! Clones share the same storage and ID.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::runtime::Runtime;

static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A versioned reactive cell holding a value of type `T`.
///
/// `PartialEq` decides whether a write is a change; for [`Value`] that is
/// host identity, so re-assigning the same object is not a change.
///
/// [`Value`]: crate::object::Value
pub struct Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    id: u64,
    value: Arc<RwLock<T>>,
    version: Arc<AtomicU64>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: next_signal_id(),
            value: Arc::new(RwLock::new(value)),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the current value, registering a dependency if a computation is
    /// running.
    pub fn get(&self) -> T {
        if let Some(subscriber_id) = ReactiveContext::current_subscriber() {
            ReactiveContext::track_dependency(self.id);
            Runtime::add_dependency(self.id, subscriber_id);
        }
        self.value.read().clone()
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Store a new value and notify dependents.
    ///
    /// Returns `false` when the value was equal to the current one, in which
    /// case nothing is notified and the version is unchanged.
    pub fn set(&self, value: T) -> bool {
        {
            let mut guard = self.value.write();
            if *guard == value {
                return false;
            }
            *guard = value;
        }
        // The lock is released before dependents run; they will read us.
        self.version.fetch_add(1, Ordering::AcqRel);
        Runtime::notify_signal_change(self.id);
        true
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.value.read());
        self.set(next)
    }

    /// Number of effective writes so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Number of computations currently depending on this signal.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.id)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            version: Arc::clone(&self.version),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("version", &self.version())
            .finish()
    }
}
