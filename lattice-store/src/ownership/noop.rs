//! Ownership audit for release builds: every hook does nothing.

use std::sync::Arc;

use crate::error::StoreError;
use crate::object::PropertyKey;
use crate::proxy::Metadata;
use crate::reactive::SubscriberId;

/// Provenance is not recorded in this build.
#[derive(Debug, Default)]
pub struct Provenance;

impl Provenance {
    #[inline(always)]
    pub(crate) fn new(_parent: Option<&Arc<Metadata>>) -> Self {
        Self
    }

    pub fn parent(&self) -> Option<Arc<Metadata>> {
        None
    }

    pub fn owners(&self) -> Option<Vec<SubscriberId>> {
        None
    }
}

#[inline(always)]
pub fn record_owner(_metadata: &Arc<Metadata>, _owner: SubscriberId) {}

#[inline(always)]
pub fn widen(_from: &Arc<Metadata>, _to: &Metadata) {}

#[inline(always)]
pub fn check(_metadata: &Arc<Metadata>, _key: Option<&PropertyKey>) {}

pub fn take_violations() -> Vec<StoreError> {
    Vec::new()
}

#[inline(always)]
pub(crate) fn adopt(_metadata: &Arc<Metadata>, _parent: Option<&Arc<Metadata>>) {}
