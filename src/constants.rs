// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the glbc controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `DNSRecord` CRD
pub const API_GROUP: &str = "kuadrant.dev";

/// API version for the `DNSRecord` CRD
pub const API_VERSION: &str = "v1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "kuadrant.dev/v1";

/// Kind name for `DNSRecord` resource
pub const KIND_DNS_RECORD: &str = "DNSRecord";

/// Kind name for the Kubernetes `Ingress` resource
pub const KIND_INGRESS: &str = "Ingress";

/// API version of the Kubernetes `Ingress` resource
pub const INGRESS_API_VERSION: &str = "networking.k8s.io/v1";

// ============================================================================
// Controller Names
// ============================================================================

/// Name of the Ingress split/aggregate controller (used in logs and metrics)
pub const INGRESS_CONTROLLER: &str = "ingress";

/// Name of the `DNSRecord` controller (used in logs and metrics)
pub const DNS_RECORD_CONTROLLER: &str = "dnsrecord";

/// Controller name of the Service shadow reconciler
pub const SERVICE_SHADOW_CONTROLLER: &str = "service";

/// Controller name of the Deployment shadow reconciler
pub const DEPLOYMENT_SHADOW_CONTROLLER: &str = "deployment";

// ============================================================================
// Hostname Generation
// ============================================================================

/// Default base domain for generated hostnames
pub const DEFAULT_DOMAIN: &str = "hcpapps.net";

/// Length of the random label prepended to the base domain
pub const GENERATED_HOST_ID_LEN: usize = 20;

/// Separator between a root Ingress name and the target cluster in leaf names
pub const LEAF_NAME_SEPARATOR: &str = "--";

/// Suffix of the per-leaf TLS secret name
pub const LEAF_TLS_SECRET_SUFFIX: &str = "-tls";

// ============================================================================
// DNS Record Constants
// ============================================================================

/// TTL of the DNS records published for root Ingresses (seconds)
pub const DNS_RECORD_TTL_SECS: i64 = 60;

/// Standard DNS port for dynamic updates
pub const DNS_PORT: u16 = 53;

/// TSIG signature validity window (seconds)
pub const TSIG_FUDGE_TIME_SECS: u64 = 300;

// ============================================================================
// Controller Runtime Constants
// ============================================================================

/// Default number of objects reconciled concurrently per controller
pub const DEFAULT_WORKERS: u16 = 2;

/// Consecutive failed reconciles retried before a key waits for its next change
pub const MAX_REQUEUES: u32 = 5;

/// Base delay of the per-key exponential retry backoff (milliseconds)
pub const RETRY_BASE_DELAY_MILLIS: u64 = 5;

/// Maximum delay of the per-key exponential retry backoff (seconds)
pub const RETRY_MAX_DELAY_SECS: u64 = 1000;

/// Delay before retrying a root status write that hit a conflict (milliseconds)
pub const CONFLICT_REQUEUE_DELAY_MILLIS: u64 = 100;

/// Delay before a deleting root Ingress re-checks that its children are gone (seconds)
pub const DELETION_RECHECK_DELAY_SECS: u64 = 5;

/// Time an unwanted shadow is kept after being marked for deletion (seconds)
pub const DELETE_DELAY_TTL_SECS: i64 = 120;

/// Attempts made when a leaf update hits an optimistic-concurrency conflict
pub const LEAF_UPDATE_ATTEMPTS: usize = 3;

// ============================================================================
// Host Watcher Constants
// ============================================================================

/// Delay before retrying a failed hostname resolution (seconds)
pub const WATCH_RETRY_DELAY_SECS: u64 = 5;

/// Poll interval used when a resolution returns no records (seconds)
pub const WATCH_EMPTY_INTERVAL_SECS: u64 = 30;

/// Lower bound for any poll interval (seconds)
pub const WATCH_MIN_INTERVAL_SECS: u64 = 1;

// ============================================================================
// Edge Proxy Constants
// ============================================================================

/// Node id the edge proxy snapshot is published for
pub const EDGE_NODE_ID: &str = "glbc";

/// Port the edge proxy forwards traffic to on cluster load balancers
pub const EDGE_UPSTREAM_PORT: u16 = 80;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of Tokio worker threads
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default bind address of the metrics and snapshot HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Path of the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path of the edge proxy snapshot endpoint
pub const SNAPSHOT_SERVER_PATH: &str = "/snapshot";
