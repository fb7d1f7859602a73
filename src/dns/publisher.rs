// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-zone publication of `DNSRecord`s with condition tracking.

use super::Provider;
use crate::crd::{Condition, DNSRecord, DNSZone, DNSZoneStatus};
use crate::errors::ProviderError;
use crate::metrics::record_provider_call;
use crate::reconcilers::status::{conditions_equal, create_condition, merge_conditions};
use kube::ResourceExt;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

pub const CONDITION_FAILED: &str = "Failed";
pub const REASON_PROVIDER_SUCCESS: &str = "ProviderSuccess";
pub const REASON_PROVIDER_ERROR: &str = "ProviderError";

const MESSAGE_ENSURED: &str = "The DNS provider succeeded in ensuring the record";
const MESSAGE_REPLACED: &str = "The DNS provider succeeded in replacing the record";

/// Errors collected while deleting a record from several zones.
#[derive(Debug)]
pub struct ZoneErrors(pub Vec<(DNSZone, ProviderError)>);

impl fmt::Display for ZoneErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(zone, err)| format!("zone {}: {err}", zone.id))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

impl std::error::Error for ZoneErrors {}

/// Publishes records through a [`Provider`].
#[derive(Clone)]
pub struct ZonePublisher {
    provider: Arc<dyn Provider>,
}

impl ZonePublisher {
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Ensure `record` in every zone and return the merged zone statuses.
    ///
    /// A zone is skipped when the record's generation was already observed and
    /// the zone reports the record as published. Provider errors are recorded
    /// as `Failed=True` conditions and never abort the remaining zones.
    pub async fn publish_to_zones(&self, zones: &[DNSZone], record: &DNSRecord) -> Vec<DNSZoneStatus> {
        let current = record
            .status
            .as_ref()
            .map(|s| s.zones.clone())
            .unwrap_or_default();
        let generation_observed = record.metadata.generation.is_some()
            && record.metadata.generation
                == record.status.as_ref().and_then(|s| s.observed_generation);

        let mut updates = Vec::new();
        for zone in zones {
            let published = is_published(&current, zone);
            if generation_observed && published {
                info!(record = %record.name_any(), zone = %zone.id, "Skipping zone to which the record is already published");
                continue;
            }

            let result = self.provider.ensure(record, zone).await;
            record_provider_call("ensure", result.is_ok());
            let condition = match result {
                Ok(()) => {
                    info!(record = %record.name_any(), zone = %zone.id, replaced = published, "Published DNS record to zone");
                    let message = if published { MESSAGE_REPLACED } else { MESSAGE_ENSURED };
                    create_condition(CONDITION_FAILED, "False", REASON_PROVIDER_SUCCESS, message)
                }
                Err(err) => {
                    error!(record = %record.name_any(), zone = %zone.id, error = %err, "Failed to publish DNS record to zone");
                    let verb = if published { "replace" } else { "ensure" };
                    create_condition(
                        CONDITION_FAILED,
                        "True",
                        REASON_PROVIDER_ERROR,
                        &format!("The DNS provider failed to {verb} the record: {err}"),
                    )
                }
            };
            updates.push(DNSZoneStatus {
                dns_zone: zone.clone(),
                conditions: vec![condition],
            });
        }

        merge_statuses(&current, updates)
    }

    /// Delete `record` from every zone it is published to.
    ///
    /// Every zone is attempted; the failures are returned together.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneErrors`] when at least one zone failed.
    pub async fn delete_record(&self, record: &DNSRecord) -> Result<(), ZoneErrors> {
        let zones = record
            .status
            .as_ref()
            .map(|s| s.zones.clone())
            .unwrap_or_default();

        let mut errors = Vec::new();
        for status in &zones {
            let zone = &status.dns_zone;
            if !is_published(&zones, zone) {
                continue;
            }
            let result = self.provider.delete(record, zone).await;
            record_provider_call("delete", result.is_ok());
            match result {
                Ok(()) => info!(record = %record.name_any(), zone = %zone.id, "Deleted DNS record from zone"),
                Err(err) => {
                    error!(record = %record.name_any(), zone = %zone.id, error = %err, "Failed to delete DNS record from zone");
                    errors.push((zone.clone(), err));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ZoneErrors(errors))
        }
    }
}

/// Whether the zone statuses mark `zone` as published (`Failed=False`).
#[must_use]
pub fn is_published(statuses: &[DNSZoneStatus], zone: &DNSZone) -> bool {
    statuses
        .iter()
        .filter(|s| &s.dns_zone == zone)
        .find_map(|s| s.conditions.iter().find(|c| c.r#type == CONDITION_FAILED))
        .is_some_and(|c| c.status == "False")
}

/// Merge zone status updates into the current list, matching zones structurally.
#[must_use]
pub fn merge_statuses(current: &[DNSZoneStatus], updates: Vec<DNSZoneStatus>) -> Vec<DNSZoneStatus> {
    let mut merged = current.to_vec();
    for update in updates {
        match merged.iter_mut().find(|s| s.dns_zone == update.dns_zone) {
            Some(existing) => {
                existing.conditions = merge_conditions(&existing.conditions, &update.conditions);
            }
            None => merged.push(update),
        }
    }
    merged
}

/// Compare zone status lists, ignoring condition order but not zone order.
#[must_use]
pub fn zone_statuses_equal(a: &[DNSZoneStatus], b: &[DNSZoneStatus]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.dns_zone == y.dns_zone && conditions_equal(&x.conditions, &y.conditions)
        })
}

/// The `Failed` condition of `zone`, if any.
#[must_use]
pub fn zone_condition<'a>(statuses: &'a [DNSZoneStatus], zone: &DNSZone) -> Option<&'a Condition> {
    statuses
        .iter()
        .find(|s| &s.dns_zone == zone)
        .and_then(|s| s.conditions.iter().find(|c| c.r#type == CONDITION_FAILED))
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod publisher_tests;
