// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DNSRecord` reconciler.
//!
//! Publishes each record to the configured zones and keeps it from being removed
//! from the cluster until it has been deleted from every zone it was published to.

use crate::constants::DNS_RECORD_CONTROLLER;
use crate::context::Context;
use crate::controller::Reconciler;
use crate::crd::{DNSRecord, DNSRecordStatus};
use crate::dns::publisher::{is_published, zone_statuses_equal};
use crate::ingress_ext::is_deleting;
use crate::key::ObjectKey;
use crate::labels::DNS_RECORD_FINALIZER;
use crate::reconcilers::finalizers::{has_finalizer, with_finalizer, without_finalizer};
use crate::store::{ignore_not_found, optional};
use anyhow::{bail, Context as _, Result};
use kube::runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info};

pub struct DNSRecordReconciler {
    ctx: Arc<Context>,
}

impl DNSRecordReconciler {
    #[must_use]
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    async fn publish(&self, key: &ObjectKey, record: DNSRecord) -> Result<()> {
        let record = if has_finalizer(&record, DNS_RECORD_FINALIZER) {
            record
        } else {
            let updated = self
                .ctx
                .store
                .update_dns_record(&with_finalizer(&record, DNS_RECORD_FINALIZER))
                .await?;
            info!(key = %key, "Added finalizer to DNS record");
            updated
        };

        let zones = &self.ctx.settings.zones;
        let statuses = self.ctx.publisher.publish_to_zones(zones, &record).await;

        let current = record.status.clone().unwrap_or_default();
        let desired = DNSRecordStatus {
            zones: statuses,
            observed_generation: record.metadata.generation,
        };

        if zone_statuses_equal(&current.zones, &desired.zones)
            && current.observed_generation == desired.observed_generation
        {
            debug!(key = %key, "DNS record status up to date");
        } else {
            let mut updated = record.clone();
            updated.status = Some(desired.clone());
            self.ctx
                .store
                .update_dns_record_status(&updated)
                .await
                .with_context(|| format!("failed to update status of DNS record {key}"))?;
            info!(key = %key, zones = desired.zones.len(), "Updated DNS record status");
        }

        let failed: Vec<&str> = zones
            .iter()
            .filter(|zone| !is_published(&desired.zones, zone))
            .map(|zone| zone.id.as_str())
            .collect();
        if !failed.is_empty() {
            bail!("DNS record {key} is not published to zones {failed:?}");
        }
        Ok(())
    }

    async fn finalize(&self, key: &ObjectKey, record: DNSRecord) -> Result<()> {
        if !has_finalizer(&record, DNS_RECORD_FINALIZER) {
            return Ok(());
        }

        self.ctx
            .publisher
            .delete_record(&record)
            .await
            .with_context(|| format!("failed to delete DNS record {key} from its zones"))?;

        ignore_not_found(
            self.ctx
                .store
                .update_dns_record(&without_finalizer(&record, DNS_RECORD_FINALIZER))
                .await
                .map(|_| ()),
        )?;
        info!(key = %key, "Removed finalizer from deleted DNS record");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Reconciler for DNSRecordReconciler {
    fn name(&self) -> &'static str {
        DNS_RECORD_CONTROLLER
    }

    async fn process(&self, key: &ObjectKey) -> Result<Action> {
        let Some(record) = optional(self.ctx.store.get_dns_record(key).await)? else {
            debug!(key = %key, "DNS record no longer exists");
            return Ok(Action::await_change());
        };

        if is_deleting(&record) {
            self.finalize(key, record).await?;
        } else {
            self.publish(key, record).await?;
        }
        Ok(Action::await_change())
    }
}

#[cfg(test)]
#[path = "dnsrecord_tests.rs"]
mod dnsrecord_tests;
