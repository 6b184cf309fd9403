//! Reactive Runtime
//!
//! The runtime connects signals to the computations that read them.
//!
//! 1. A computation registers itself and receives a [`ReactiveHandle`].
//! 2. When a signal is read inside that computation, the runtime records the
//!    edge `signal -> subscriber`.
//! 3. When the signal is written, every recorded subscriber is scheduled.
//!    Inside [`Runtime::batch`] the scheduling is deferred until the
//!    outermost batch closes, and each subscriber runs at most once.
//!
//! The registry is global so that signals can be shared across threads; the
//! batch queue is thread-local like the reactive context.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;

use super::context::SubscriberId;

/// A computation that can be re-run when its dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID of this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Re-run the computation because a dependency changed.
    fn schedule(&self);
}

/// Handle to a registered computation.
///
/// Dropping the handle unregisters the computation and forgets its edges.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl ReactiveHandle {
    /// Get the subscriber ID this handle was registered under.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

type Registry = RwLock<HashMap<SubscriberId, Weak<dyn Reactive>>>;
type SignalSubscribers = RwLock<HashMap<u64, Vec<SubscriberId>>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static SIGNAL_SUBSCRIBERS: OnceLock<SignalSubscribers> = OnceLock::new();

thread_local! {
    static BATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
    static PENDING: RefCell<Vec<SubscriberId>> = const { RefCell::new(Vec::new()) };
}

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn signal_subscribers() -> &'static SignalSubscribers {
    SIGNAL_SUBSCRIBERS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Decrements the batch depth even if the batched closure panics.
struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        BATCH_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

impl Runtime {
    /// Register a computation with the runtime.
    pub fn register(reactive: Arc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();
        registry().write().insert(id, Arc::downgrade(&reactive));
        ReactiveHandle { subscriber_id: id }
    }

    fn unregister(id: SubscriberId) {
        registry().write().remove(&id);
        Self::clear_dependencies(id);
    }

    /// Record that a subscriber depends on a signal.
    pub fn add_dependency(signal_id: u64, subscriber_id: SubscriberId) {
        let mut subscribers = signal_subscribers().write();
        let entry = subscribers.entry(signal_id).or_default();
        if !entry.contains(&subscriber_id) {
            entry.push(subscriber_id);
        }
    }

    /// Remove every edge pointing at a subscriber.
    ///
    /// Called before a computation re-runs so stale dependencies are dropped.
    pub fn clear_dependencies(subscriber_id: SubscriberId) {
        let mut subscribers = signal_subscribers().write();
        subscribers.retain(|_, subs| {
            subs.retain(|s| *s != subscriber_id);
            !subs.is_empty()
        });
    }

    /// Number of computations currently depending on a signal.
    pub fn subscriber_count(signal_id: u64) -> usize {
        signal_subscribers()
            .read()
            .get(&signal_id)
            .map_or(0, Vec::len)
    }

    /// Schedule every subscriber of a signal that just changed.
    pub fn notify_signal_change(signal_id: u64) {
        let subscriber_ids = signal_subscribers()
            .read()
            .get(&signal_id)
            .cloned()
            .unwrap_or_default();

        if subscriber_ids.is_empty() {
            return;
        }

        if Self::is_batching() {
            PENDING.with(|pending| {
                let mut pending = pending.borrow_mut();
                for id in subscriber_ids {
                    if !pending.contains(&id) {
                        pending.push(id);
                    }
                }
            });
            return;
        }

        Self::run(subscriber_ids);
    }

    /// Run `f` and defer every re-run it triggers until it returns.
    ///
    /// Batches nest; only the outermost one flushes.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        let result = {
            BATCH_DEPTH.with(|depth| depth.set(depth.get() + 1));
            let _guard = BatchGuard;
            f()
        };

        if !Self::is_batching() {
            let pending = PENDING.with(|pending| std::mem::take(&mut *pending.borrow_mut()));
            Self::run(pending);
        }

        result
    }

    /// Check if a batch is open on this thread.
    pub fn is_batching() -> bool {
        BATCH_DEPTH.with(|depth| depth.get() > 0)
    }

    fn run(subscriber_ids: Vec<SubscriberId>) {
        // Upgrade first so the registry lock is released before anything runs.
        let scheduled: Vec<Arc<dyn Reactive>> = {
            let registry = registry().read();
            subscriber_ids
                .iter()
                .filter_map(|id| registry.get(id).and_then(Weak::upgrade))
                .collect()
        };

        for reactive in scheduled {
            reactive.schedule();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct MockReactive {
        id: SubscriberId,
        scheduled: AtomicI32,
    }

    impl MockReactive {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::new(),
                scheduled: AtomicI32::new(0),
            })
        }
    }

    impl Reactive for MockReactive {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn schedule(&self) {
            self.scheduled.fetch_add(1, Ordering::SeqCst);
        }
    }

    // Signal IDs in these tests are far above anything `Signal::new` hands out.
    const SIGNAL: u64 = u64::MAX - 10;

    #[test]
    fn runtime_registers_and_unregisters() {
        let reactive = MockReactive::new();
        let id = reactive.id;

        let handle = Runtime::register(reactive);
        assert!(registry().read().contains_key(&id));

        drop(handle);
        assert!(!registry().read().contains_key(&id));
    }

    #[test]
    fn runtime_schedules_subscribers() {
        let a = MockReactive::new();
        let b = MockReactive::new();
        let _a_handle = Runtime::register(a.clone());
        let _b_handle = Runtime::register(b.clone());

        Runtime::add_dependency(SIGNAL, a.id);
        Runtime::add_dependency(SIGNAL, a.id);
        Runtime::add_dependency(SIGNAL, b.id);

        Runtime::notify_signal_change(SIGNAL);

        assert_eq!(a.scheduled.load(Ordering::SeqCst), 1);
        assert_eq!(b.scheduled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn runtime_clears_dependencies() {
        let reactive = MockReactive::new();
        let _handle = Runtime::register(reactive.clone());

        Runtime::add_dependency(SIGNAL - 1, reactive.id);
        assert_eq!(Runtime::subscriber_count(SIGNAL - 1), 1);

        Runtime::clear_dependencies(reactive.id);
        assert_eq!(Runtime::subscriber_count(SIGNAL - 1), 0);
    }

    #[test]
    fn batch_defers_and_deduplicates() {
        let reactive = MockReactive::new();
        let _handle = Runtime::register(reactive.clone());
        Runtime::add_dependency(SIGNAL - 2, reactive.id);
        Runtime::add_dependency(SIGNAL - 3, reactive.id);

        Runtime::batch(|| {
            Runtime::notify_signal_change(SIGNAL - 2);
            Runtime::batch(|| Runtime::notify_signal_change(SIGNAL - 3));
            assert_eq!(reactive.scheduled.load(Ordering::SeqCst), 0);
        });

        assert!(!Runtime::is_batching());
        assert_eq!(reactive.scheduled.load(Ordering::SeqCst), 1);
    }
}
