// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconcilers driven by [`kube::runtime::Controller`] through [`crate::controller`].
//!
//! # Reconciliation Architecture
//!
//! Each reconciler is handed a key, loads the object's *current* state from the
//! store, never from the triggering event, and:
//!
//! 1. **Snapshot** - keeps the object as read
//! 2. **Mutate** - builds the desired object on a copy
//! 3. **Diff** - compares desired and current state
//! 4. **Write** - persists only what changed
//!
//! A second pass over an unchanged object therefore writes nothing.
//!
//! # Available Reconcilers
//!
//! - [`IngressReconciler`] - splits root Ingresses into per-cluster leaves,
//!   aggregates leaf addresses and drives the root's `DNSRecord`
//! - [`DNSRecordReconciler`] - publishes `DNSRecord`s to the configured zones
//! - [`ServiceShadowReconciler`] - copies placed Services into per-cluster shadows
//! - [`DeploymentShadowReconciler`] - places Deployments along with the Services selecting them

pub mod delete_delay;
pub mod dnsrecord;
pub mod finalizers;
pub mod ingress;
pub mod shadow;
pub mod status;

pub use dnsrecord::DNSRecordReconciler;
pub use ingress::{IngressReconciler, IngressRole};
pub use shadow::{DeploymentShadowReconciler, ServiceShadowReconciler};
