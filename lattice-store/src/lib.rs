//! Lattice Store
//!
//! Deep-reactive state for the Lattice reactive framework. Plain objects and
//! arrays are wrapped in proxies that behave like the objects themselves,
//! while every property read is tracked as a dependency of the running
//! computation and every write re-runs exactly the computations that read
//! what changed.
//!
//! It implements:
//!
//! - Reactive primitives (signals, effects, batching)
//! - A host object model with property descriptors and arrays
//! - Proxies with per-property cells and a structural version
//! - An ownership audit for debug builds
//!
//! The crate is designed to be used both as a native Rust library and, with
//! the `python` feature, as a Python extension module via PyO3.
//!
//! # Architecture
//!
//! - `reactive`: signals, effects and dependency tracking
//! - `object`: the objects that get proxied
//! - `proxy`: the wrapper factory and the proxy operations
//! - `ownership`: which computations may mutate which state
//!
//! # Example
//!
//! ```rust
//! use lattice_store::reactive::Effect;
//! use lattice_store::{wrap, Value};
//! use serde_json::json;
//!
//! let state = wrap(Value::from(json!({ "count": 0 })), None);
//! let state = state.as_proxy().unwrap().clone();
//!
//! let watched = state.clone();
//! let effect = Effect::new(move || {
//!     println!("count = {:?}", watched.get("count"));
//! });
//!
//! // The effect re-runs and prints "count = Some(1)".
//! state.set("count", Value::from(1));
//! assert_eq!(effect.run_count(), 2);
//! ```

pub mod error;
pub mod object;
pub mod ownership;
pub mod proxy;
pub mod reactive;

pub use error::{StoreError, StoreResult};
pub use object::{ObjectRef, PropertyDescriptor, PropertyKey, Value};
pub use proxy::{is_same, unwrap, wrap, Proxy};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition.
///
/// This function is called by Python when importing the module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<proxy::PyState>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
