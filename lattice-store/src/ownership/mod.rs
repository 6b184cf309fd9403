//! Ownership Audit
//!
//! A development aid that catches state being mutated by a computation it
//! was never handed to.
//!
//! Every proxied object has a provenance: the record it was nested under
//! when first wrapped, and a set of owners allowed to mutate it. A root
//! object is owned by the computation that created it (or by anyone, if it
//! was created outside one); a nested object starts with no owners of its
//! own and defers to its ancestors. Storing a proxy inside another widens the
//! stored proxy's owners with those of its new ancestors.
//!
//! A mutation made while a computation is running is checked against that
//! computation. Violations never block the mutation: they are logged with
//! `tracing` and queued for [`take_violations`].
//!
//! # Build variants
//!
//! The audit is compiled into debug builds, and into release builds with the
//! `ownership-audit` feature. Otherwise a no-op implementation with the same
//! interface is used and provenance takes no space.

#[cfg(any(debug_assertions, feature = "ownership-audit"))]
mod audit;
#[cfg(any(debug_assertions, feature = "ownership-audit"))]
pub use audit::{check, record_owner, take_violations, widen, Provenance};
#[cfg(any(debug_assertions, feature = "ownership-audit"))]
pub(crate) use audit::adopt;

#[cfg(not(any(debug_assertions, feature = "ownership-audit")))]
mod noop;
#[cfg(not(any(debug_assertions, feature = "ownership-audit")))]
pub use noop::{check, record_owner, take_violations, widen, Provenance};
#[cfg(not(any(debug_assertions, feature = "ownership-audit")))]
pub(crate) use noop::adopt;
