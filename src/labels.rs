// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label, annotation and finalizer constants shared by the reconcilers.
//!
//! Placement labels are written by the multi-cluster placement layer; the
//! `kuadrant.dev` annotations are owned by this controller.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value for `app.kubernetes.io/managed-by` on resources created by glbc
pub const MANAGED_BY_GLBC: &str = "glbc";

// ============================================================================
// Placement Labels
// ============================================================================

/// Label holding the target cluster of a leaf Ingress (and the location of a Service)
pub const CLUSTER_LABEL: &str = "kcp.dev/cluster";

/// Label holding the name of the root a leaf or shadow was split from
pub const OWNED_BY_LABEL: &str = "kcp.dev/owned-by";

/// Annotation listing the clusters a root Service is placed on (comma separated)
pub const PLACEMENT_ANNOTATION: &str = "kcp.dev/placement";

/// Annotation holding the unix time after which a shadow may be removed
pub const DELETE_AT_ANNOTATION: &str = "kcp.dev/delete-at";

/// Annotation holding the logical cluster (workspace) an object lives in
pub const LOGICAL_CLUSTER_ANNOTATION: &str = "kcp.dev/logical-cluster";

// ============================================================================
// glbc Annotations
// ============================================================================

/// Annotation holding the generated global hostname of a root Ingress
pub const HOST_GENERATED_ANNOTATION: &str = "kuadrant.dev/host.generated";

/// Annotation recording the rule hosts that were replaced by the generated host (JSON list)
pub const CUSTOM_HOSTS_REPLACED_ANNOTATION: &str = "kuadrant.dev/custom-hosts.replaced";

/// Annotation recording the certificate requested for the generated host
pub const TLS_CERTIFICATE_ANNOTATION: &str = "kuadrant.dev/tls.certificate";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer keeping a root Ingress until its leaves and DNS record are gone
pub const CASCADE_CLEANUP_FINALIZER: &str = "kcp.dev/cascade-cleanup";

/// Finalizer keeping a `DNSRecord` until it is removed from every zone
pub const DNS_RECORD_FINALIZER: &str = "kuadrant.dev/dns-record";

/// Finalizer keeping a root Service or Deployment until its shadows are deleted
pub const SHADOW_CLEANUP_FINALIZER: &str = "kcp.dev/shadow-cleanup";

/// Finalizer keeping an unwanted shadow until its delete-at time has passed
pub const AWAITING_DELETE_FINALIZER: &str = "kcp.dev/awaiting-delete-time";

// ============================================================================
// Field Manager
// ============================================================================

/// Field manager used for every patch issued by glbc
pub const FIELD_MANAGER: &str = "glbc";
