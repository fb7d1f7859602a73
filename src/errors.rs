// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for glbc.
//!
//! This module provides specialized error types for:
//! - State store operations (Kubernetes API or the in-memory store)
//! - Hostname resolution backends
//! - DNS provider operations
//!
//! Reconcilers work with `anyhow::Result` and inspect these types where the
//! outcome changes control flow (not-found races, optimistic-concurrency conflicts).

use thiserror::Error;

/// Errors returned by a [`StateStore`](crate::store::StateStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The object does not exist (HTTP 404)
    #[error("{kind} '{key}' not found")]
    NotFound {
        /// Kind of the object
        kind: String,
        /// Display form of the object key
        key: String,
    },

    /// An object with the same name already exists (HTTP 409, reason `AlreadyExists`)
    #[error("{kind} '{key}' already exists")]
    AlreadyExists {
        /// Kind of the object
        kind: String,
        /// Display form of the object key
        key: String,
    },

    /// The write was based on a stale resource version (HTTP 409)
    ///
    /// Another writer advanced the object; the caller should requeue rather than fail.
    #[error("conflict writing {kind} '{key}': {reason}")]
    Conflict {
        /// Kind of the object
        kind: String,
        /// Display form of the object key
        key: String,
        /// Message returned by the store
        reason: String,
    },

    /// Any other Kubernetes API error
    #[error(transparent)]
    Api(kube::Error),

    /// A patch or object could not be serialized
    #[error("failed to serialize {kind} '{key}': {source}")]
    Serialization {
        /// Kind of the object
        kind: String,
        /// Display form of the object key
        key: String,
        /// Underlying serde error
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Map a Kubernetes API error onto the store taxonomy.
    #[must_use]
    pub fn from_kube(err: kube::Error, kind: &str, key: &str) -> Self {
        match &err {
            kube::Error::Api(resp) if resp.code == 404 => Self::NotFound {
                kind: kind.to_string(),
                key: key.to_string(),
            },
            kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
                Self::AlreadyExists {
                    kind: kind.to_string(),
                    key: key.to_string(),
                }
            }
            kube::Error::Api(resp) if resp.code == 409 => Self::Conflict {
                kind: kind.to_string(),
                key: key.to_string(),
                reason: resp.message.clone(),
            },
            _ => Self::Api(err),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors returned by a [`HostResolver`](crate::net::HostResolver).
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// DNS lookup of the hostname failed
    #[error("failed to resolve '{host}': {reason}")]
    LookupFailed {
        /// Hostname being resolved
        host: String,
        /// Resolver error message
        reason: String,
    },

    /// The hostname has no entry in a static or config-map backed table
    #[error("no addresses configured for '{host}'")]
    UnknownHost {
        /// Hostname being resolved
        host: String,
    },

    /// The config map backing the resolver could not be read
    #[error("failed to read host config map {namespace}/{name}: {reason}")]
    ConfigMapUnavailable {
        /// Namespace of the config map
        namespace: String,
        /// Name of the config map
        name: String,
        /// Underlying error message
        reason: String,
    },

    /// An entry of the config map is not a valid address list
    #[error("invalid address list for '{host}': {reason}")]
    InvalidEntry {
        /// Hostname of the malformed entry
        host: String,
        /// Parse error message
        reason: String,
    },
}

/// Errors returned by a DNS [`Provider`](crate::dns::Provider).
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// A record target cannot be expressed as record data of the requested type
    #[error("invalid target '{target}' for {record_type} record '{name}'")]
    InvalidTarget {
        /// Record name
        name: String,
        /// Record type
        record_type: String,
        /// Offending target
        target: String,
    },

    /// A record or zone name is not a valid DNS name
    #[error("invalid DNS name '{name}': {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// Parse error message
        reason: String,
    },

    /// The DNS server rejected the update
    #[error("update of '{name}' in zone '{zone}' rejected by {server}: {code}")]
    UpdateRejected {
        /// Record name
        name: String,
        /// Zone id
        zone: String,
        /// Server address
        server: String,
        /// DNS response code
        code: String,
    },

    /// The update could not be delivered to the server
    #[error("failed to reach DNS server {server}: {reason}")]
    Transport {
        /// Server address
        server: String,
        /// Transport error message
        reason: String,
    },

    /// TSIG credentials are unusable
    #[error("invalid TSIG key '{key_name}': {reason}")]
    InvalidTsigKey {
        /// Key name
        key_name: String,
        /// Explanation
        reason: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
