// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions owned by glbc.
//!
//! glbc publishes one `DNSRecord` per exposed root Ingress. The record carries the
//! generated hostname and the load-balancer addresses aggregated from every leaf,
//! and its status tracks publication per DNS zone.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: kuadrant.dev/v1
//! kind: DNSRecord
//! metadata:
//!   name: web
//!   namespace: default
//! spec:
//!   dnsName: c9a2b5kq3s1h7mlr0tge.hcpapps.net
//!   recordType: A
//!   recordTTL: 60
//!   targets:
//!     - 192.0.2.10
//!     - 192.0.2.11
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. `DNSRecord` zones use `Failed`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// DNS record type published for a `DNSRecord`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub enum RecordType {
    #[default]
    A,
    #[serde(rename = "CNAME")]
    Cname,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::Cname => write!(f, "CNAME"),
        }
    }
}

/// A provider-side hosted zone a record can be published to.
///
/// Zones are configured on the controller, not derived from the record.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DNSZone {
    /// Provider-specific zone identifier (the zone origin for RFC 2136 servers).
    pub id: String,

    /// Provider-specific tags identifying the zone.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Publication state of a record in one zone.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DNSZoneStatus {
    /// The zone this status refers to.
    pub dns_zone: DNSZone,

    /// Conditions of the record in this zone. A `Failed` condition with status
    /// `False` means the record is currently published.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// `DNSRecord` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DNSRecordStatus {
    /// One entry per zone the record has been asked to publish to.
    #[serde(default)]
    pub zones: Vec<DNSZoneStatus>,

    /// Last spec generation successfully processed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// `DNSRecord` publishes a hostname and its target addresses to the configured zones.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "kuadrant.dev",
    version = "v1",
    kind = "DNSRecord",
    namespaced,
    derive = "PartialEq",
    shortname = "dnsr",
    doc = "DNSRecord publishes the generated hostname of a root Ingress, pointing at the load-balancer addresses of every cluster the Ingress is placed on."
)]
#[kube(status = "DNSRecordStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSRecordSpec {
    /// Fully qualified hostname of the record.
    pub dns_name: String,

    /// Target addresses (IPs for A records, a hostname for CNAME records).
    #[serde(default)]
    pub targets: Vec<String>,

    /// Record type: A or CNAME.
    pub record_type: RecordType,

    /// TTL of the record in seconds.
    #[serde(rename = "recordTTL")]
    #[schemars(range(min = 0, max = 2_147_483_647))]
    pub record_ttl: i64,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
