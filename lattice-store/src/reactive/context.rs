//! Reactive Context
//!
//! The reactive context records which computation is currently running so
//! that reads can register themselves as dependencies of it. Proxies also use
//! it as the "active computation" probe in `has` and as the owner identity in
//! the ownership audit.
//!
//! # Implementation
//!
//! A thread-local stack holds one frame per running computation. Entering a
//! computation pushes a tracking frame; [`ReactiveContext::untracked`] pushes
//! a frame with no subscriber, which hides the computations below it for the
//! duration of the closure.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

/// Unique identifier for a computation that depends on reactive values.
///
/// Effects get one when they are created. The same identifier doubles as the
/// owner identity recorded by the ownership audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber#{}", self.0)
    }
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// One entry of the context stack.
#[derive(Debug)]
struct Frame {
    /// `None` for an untracked region.
    subscriber_id: Option<SubscriberId>,
    /// Signal IDs read while this frame was on top, without duplicates.
    dependencies: SmallVec<[u64; 8]>,
}

/// Guard that pops its frame when dropped.
///
/// Dropping in the right order is what keeps the stack balanced, including
/// when the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a tracking context for the given subscriber.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Run `f` with dependency tracking switched off.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let _guard = Self::push(None);
        f()
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                subscriber_id,
                dependencies: SmallVec::new(),
            });
        });
        Self { subscriber_id }
    }

    /// Check if a tracking computation is running on this thread.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the subscriber of the innermost frame, if it tracks.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|frame| frame.subscriber_id))
    }

    /// Record a read of the given signal in the innermost tracking frame.
    pub fn track_dependency(signal_id: u64) {
        CONTEXT_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                if frame.subscriber_id.is_some() && !frame.dependencies.contains(&signal_id) {
                    frame.dependencies.push(signal_id);
                }
            }
        });
    }

    /// Get the dependencies collected in the innermost frame.
    pub fn get_dependencies() -> Vec<u64> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|frame| frame.dependencies.to_vec())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, frame.subscriber_id
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let a = SubscriberId::new();
        let b = SubscriberId::new();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn context_tracks_subscriber() {
        let id = SubscriberId::new();
        assert!(!ReactiveContext::is_active());

        {
            let _ctx = ReactiveContext::enter(id);
            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn dependencies_are_deduplicated() {
        let _ctx = ReactiveContext::enter(SubscriberId::new());

        ReactiveContext::track_dependency(1);
        ReactiveContext::track_dependency(2);
        ReactiveContext::track_dependency(1);

        assert_eq!(ReactiveContext::get_dependencies(), vec![1, 2]);
    }

    #[test]
    fn untracked_hides_the_running_computation() {
        let id = SubscriberId::new();
        let _ctx = ReactiveContext::enter(id);

        ReactiveContext::untracked(|| {
            assert!(!ReactiveContext::is_active());
            ReactiveContext::track_dependency(7);
        });

        assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        assert!(ReactiveContext::get_dependencies().is_empty());
    }

    #[test]
    fn nested_contexts() {
        let outer = SubscriberId::new();
        let inner = SubscriberId::new();

        let _outer_ctx = ReactiveContext::enter(outer);
        {
            let _inner_ctx = ReactiveContext::enter(inner);
            assert_eq!(ReactiveContext::current_subscriber(), Some(inner));
        }
        assert_eq!(ReactiveContext::current_subscriber(), Some(outer));
    }
}
