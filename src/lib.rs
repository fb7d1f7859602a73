// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # glbc - Global load-balancing controller
//!
//! glbc exposes Ingresses across several workload clusters behind a single
//! generated hostname.
//!
//! ## Overview
//!
//! - A user creates a *root* Ingress. glbc assigns it a generated host under
//!   the configured domain and places one *leaf* copy per cluster hosting its
//!   backend Services.
//! - Leaf load-balancer addresses are aggregated back into the root status.
//! - A [`DNSRecord`](crd::DNSRecord) derived from the root is published to every
//!   configured zone through a [`Provider`](dns::Provider).
//! - Load balancers exposing hostnames are resolved and re-resolved at half
//!   their TTL by the [`HostsWatcher`](net::HostsWatcher).
//! - Placed Services and the Deployments they select are copied into one
//!   shadow per cluster; dropped shadows are removed after a delay.
//!
//! ## Modules
//!
//! - [`crd`] - the `DNSRecord` custom resource
//! - [`reconcilers`] - Ingress, `DNSRecord` and Service/Deployment shadow reconciliation
//! - [`controller`] / [`events`] - glue to `kube::runtime::Controller` and its watch mappers
//! - [`store`] - cluster state access, backed by kube or held in memory
//! - [`dns`] - zone publication and the RFC 2136 provider
//! - [`net`] - host resolution and re-resolution
//! - [`tracker`] - Service to Ingress index
//! - [`tls`] / [`edge`] - certificate and edge-proxy snapshot interfaces

pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod dns;
pub mod edge;
pub mod errors;
pub mod events;
pub mod ingress_ext;
pub mod key;
pub mod labels;
pub mod metrics;
pub mod net;
pub mod reconcilers;
pub mod store;
pub mod tls;
pub mod tracker;
