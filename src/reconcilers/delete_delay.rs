// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Delayed removal of shadow objects.
//!
//! An unwanted shadow is not removed at once. It is first marked with the
//! [`AWAITING_DELETE_FINALIZER`] and a [`DELETE_AT_ANNOTATION`] holding a unix
//! time, then deleted; the finalizer is released once that time has passed, so
//! workloads keep serving while traffic drains away from the cluster.

use crate::constants::DELETE_DELAY_TTL_SECS;
use crate::labels::{AWAITING_DELETE_FINALIZER, DELETE_AT_ANNOTATION};
use crate::reconcilers::finalizers::{has_finalizer, with_finalizer, without_finalizer};
use anyhow::{Context as _, Result};
use chrono::{DateTime, TimeDelta, Utc};
use kube::{Resource, ResourceExt};
use std::time::Duration;

/// Mark `obj` for deletion at `at`.
///
/// Returns `None` when the object is already marked, keeping its first delete-at time.
#[must_use]
pub fn mark_for_deletion<K: Resource + Clone>(obj: &K, at: DateTime<Utc>) -> Option<K> {
    if has_finalizer(obj, AWAITING_DELETE_FINALIZER) {
        return None;
    }
    let mut marked = with_finalizer(obj, AWAITING_DELETE_FINALIZER);
    marked
        .annotations_mut()
        .insert(DELETE_AT_ANNOTATION.to_string(), at.timestamp().to_string());
    Some(marked)
}

/// Mark `obj` for deletion [`DELETE_DELAY_TTL_SECS`] after `now`.
#[must_use]
pub fn mark_with_default_ttl<K: Resource + Clone>(obj: &K, now: DateTime<Utc>) -> Option<K> {
    mark_for_deletion(obj, now + TimeDelta::seconds(DELETE_DELAY_TTL_SECS))
}

/// Time left before `obj` may be removed.
///
/// Zero when the delete-at time has passed or the object carries none.
///
/// # Errors
///
/// Returns an error when the annotation is not a unix time.
pub fn time_to_live<K: Resource>(obj: &K, now: DateTime<Utc>) -> Result<Duration> {
    let Some(value) = obj.annotations().get(DELETE_AT_ANNOTATION) else {
        return Ok(Duration::ZERO);
    };
    let delete_at: i64 = value
        .parse()
        .with_context(|| format!("invalid {DELETE_AT_ANNOTATION} annotation {value:?}"))?;
    let remaining = delete_at.saturating_sub(now.timestamp());
    Ok(Duration::from_secs(u64::try_from(remaining).unwrap_or(0)))
}

/// Drop the delete-delay finalizer and annotation.
#[must_use]
pub fn clean_for_deletion<K: Resource + Clone>(obj: &K) -> K {
    let mut cleaned = without_finalizer(obj, AWAITING_DELETE_FINALIZER);
    cleaned.annotations_mut().remove(DELETE_AT_ANNOTATION);
    cleaned
}

#[cfg(test)]
#[path = "delete_delay_tests.rs"]
mod delete_delay_tests;
