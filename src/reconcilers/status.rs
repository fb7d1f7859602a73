// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers.
//!
//! Conditions follow the Kubernetes conventions:
//! - `type`: the aspect being reported (`DNSRecord` zones use `Failed`)
//! - `status`: `True`, `False` or `Unknown`
//! - `reason`: a `CamelCase` programmatic identifier
//! - `message`: a human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp of the last change
//!
//! # Example
//!
//! ```rust,no_run
//! use glbc::reconcilers::status::create_condition;
//!
//! let condition = create_condition(
//!     "Failed",
//!     "False",
//!     "ProviderSuccess",
//!     "The DNS provider succeeded in ensuring the record",
//! );
//! assert_eq!(condition.r#type, "Failed");
//! ```

use crate::crd::Condition;
use chrono::Utc;

/// Create a new condition stamped with the current time.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Whether `update` carries different details than `existing`.
///
/// The transition time is not compared.
#[must_use]
pub fn condition_changed(existing: &Condition, update: &Condition) -> bool {
    existing.status != update.status
        || existing.reason != update.reason
        || existing.message != update.message
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Merge `updates` into `conditions`, matching by type.
///
/// A matched condition is overwritten, with a fresh transition time, only when
/// its status, reason or message changed; otherwise it is kept as is, original
/// timestamp included. Unmatched updates are appended with a fresh timestamp.
#[must_use]
pub fn merge_conditions(conditions: &[Condition], updates: &[Condition]) -> Vec<Condition> {
    let now = Utc::now().to_rfc3339();
    let mut merged = conditions.to_vec();

    for update in updates {
        match merged.iter_mut().find(|c| c.r#type == update.r#type) {
            Some(existing) => {
                if condition_changed(existing, update) {
                    existing.status.clone_from(&update.status);
                    existing.reason.clone_from(&update.reason);
                    existing.message.clone_from(&update.message);
                    existing.last_transition_time = Some(now.clone());
                }
            }
            None => {
                let mut added = update.clone();
                added.last_transition_time = Some(now.clone());
                merged.push(added);
            }
        }
    }

    merged
}

/// Compare two condition lists ignoring order.
#[must_use]
pub fn conditions_equal(a: &[Condition], b: &[Condition]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&Condition> = a.iter().collect();
    let mut b: Vec<&Condition> = b.iter().collect();
    a.sort_by(|x, y| x.r#type.cmp(&y.r#type));
    b.sort_by(|x, y| x.r#type.cmp(&y.r#type));
    a == b
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
