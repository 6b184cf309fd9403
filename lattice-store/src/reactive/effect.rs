//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a signal
//! it read during its last run changes.
//!
//! 1. When created, the effect runs immediately to collect dependencies.
//! 2. Each run clears the previous edges and records the new ones, so a
//!    branch that stops reading a signal stops depending on it.
//! 3. Re-runs are synchronous. A write the effect makes to one of its own
//!    dependencies while running does not re-enter it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::context::{ReactiveContext, SubscriberId};
use super::runtime::{Reactive, ReactiveHandle, Runtime};

struct EffectInner {
    subscriber_id: SubscriberId,
    run: Box<dyn Fn() + Send + Sync>,
    disposed: AtomicBool,
    running: AtomicBool,
    run_count: AtomicUsize,
    dependency_count: AtomicUsize,
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        Runtime::clear_dependencies(self.subscriber_id);
        {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            (self.run)();
            self.dependency_count
                .store(ReactiveContext::get_dependencies().len(), Ordering::SeqCst);
        }

        self.run_count.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn schedule(&self) {
        self.execute();
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let state = wrap(Value::from(json!({ "count": 0 })), None);
/// let proxy = state.as_proxy().unwrap().clone();
///
/// let effect = Effect::new(move || {
///     println!("count is {:?}", proxy.get("count"));
/// });
/// ```
///
/// Clones share the same computation; it is unregistered when the last clone
/// is dropped.
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
    _handle: Arc<ReactiveHandle>,
}

impl Effect {
    /// Create an effect and run it immediately.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create an effect without running it.
    ///
    /// It has no dependencies until [`Effect::execute`] is called.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            subscriber_id: SubscriberId::new(),
            run: Box::new(run),
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
            dependency_count: AtomicUsize::new(0),
        });
        let handle = Runtime::register(inner.clone());

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Run the effect now, re-collecting its dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Stop the effect. It never runs again and its edges are dropped.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        Runtime::clear_dependencies(self.inner.subscriber_id);
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of distinct signals read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependency_count.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("subscriber_id", &self.subscriber_id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let effect = Effect::new(|| {});
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn lazy_effect_waits_for_execute() {
        let effect = Effect::new_lazy(|| {});
        assert_eq!(effect.run_count(), 0);

        effect.execute();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_a_dependency_changes() {
        let signal = Signal::new(0);
        let seen = Arc::new(AtomicI32::new(-1));

        let effect = {
            let signal = signal.clone();
            let seen = seen.clone();
            Effect::new(move || seen.store(signal.get(), Ordering::SeqCst))
        };
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(effect.dependency_count(), 1);

        signal.set(7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(effect.run_count(), 2);

        // Equal write, no re-run.
        signal.set(7);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn disposed_effect_does_not_run() {
        let signal = Signal::new(0);
        let effect = {
            let signal = signal.clone();
            Effect::new(move || {
                signal.get();
            })
        };

        effect.dispose();
        signal.set(1);
        effect.execute();

        assert!(effect.is_disposed());
        assert_eq!(effect.run_count(), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn self_writes_do_not_reenter() {
        let signal = Signal::new(0);
        let effect = {
            let signal = signal.clone();
            Effect::new(move || {
                let v = signal.get();
                signal.set(v + 1);
            })
        };

        assert_eq!(effect.run_count(), 1);
        assert_eq!(signal.get_untracked(), 1);
    }

    #[test]
    fn dropping_the_last_clone_unregisters() {
        let signal = Signal::new(0);
        let effect = {
            let signal = signal.clone();
            Effect::new(move || {
                signal.get();
            })
        };
        let clone = effect.clone();
        drop(effect);
        assert_eq!(signal.subscriber_count(), 1);

        drop(clone);
        assert_eq!(signal.subscriber_count(), 0);
    }
}
