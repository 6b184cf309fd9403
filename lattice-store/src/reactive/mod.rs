//! Reactive Primitives
//!
//! The cells and computations that deep-reactive state is built on.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a versioned cell. Reading it inside a running computation
//! registers the computation as a dependent; writing a different value
//! notifies every dependent. Each proxied property is one signal.
//!
//! ## Effects
//!
//! An [`Effect`] is a computation that re-runs whenever a signal it read
//! changes. Effects are how dependents of proxied state observe it.
//!
//! ## Context and runtime
//!
//! [`ReactiveContext`] is the thread-local stack of running computations and
//! [`Runtime`] the global signal → subscriber index that routes
//! notifications, optionally deferred with [`Runtime::batch`].

mod context;
mod effect;
mod runtime;
mod signal;

pub use context::{ReactiveContext, SubscriberId};
pub use effect::Effect;
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use signal::Signal;
