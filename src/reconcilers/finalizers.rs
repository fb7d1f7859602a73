// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer helpers.
//!
//! These operate on a copy of the object; the caller persists the result through
//! the state store, so a finalizer change goes through the same optimistic
//! concurrency check as every other write.
//!
//! # Example
//!
//! ```rust,ignore
//! use glbc::reconcilers::finalizers::{has_finalizer, with_finalizer};
//!
//! if !has_finalizer(&record, DNS_RECORD_FINALIZER) {
//!     record = store.update_dns_record(&with_finalizer(&record, DNS_RECORD_FINALIZER)).await?;
//! }
//! ```

use kube::{Resource, ResourceExt};

/// Whether `resource` carries `finalizer`.
pub fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource.finalizers().iter().any(|f| f == finalizer)
}

/// Copy of `resource` with `finalizer` appended if missing.
#[must_use]
pub fn with_finalizer<T: Resource + Clone>(resource: &T, finalizer: &str) -> T {
    let mut updated = resource.clone();
    if !has_finalizer(resource, finalizer) {
        updated.finalizers_mut().push(finalizer.to_string());
    }
    updated
}

/// Copy of `resource` without `finalizer`.
#[must_use]
pub fn without_finalizer<T: Resource + Clone>(resource: &T, finalizer: &str) -> T {
    let mut updated = resource.clone();
    updated.finalizers_mut().retain(|f| f != finalizer);
    updated
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
