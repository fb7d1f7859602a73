// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Certificate provisioning for generated hosts.

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Maximum length of a Kubernetes object name.
const MAX_NAME_LEN: usize = 253;

/// A certificate to issue for one generated host.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CertificateRequest {
    name: String,
    host: String,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
}

impl CertificateRequest {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        labels: BTreeMap<String, String>,
        annotations: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            labels,
            annotations,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    #[must_use]
    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }
}

/// Certificate name for a root Ingress: `<cluster>-<namespace>-<name>`, reduced
/// to the characters allowed in object names.
#[must_use]
pub fn certificate_name(cluster: &str, namespace: &str, name: &str) -> String {
    let raw = [cluster, namespace, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-");

    let mut sanitized: String = raw
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    sanitized.truncate(MAX_NAME_LEN);
    sanitized
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

/// Issues and revokes certificates.
#[async_trait::async_trait]
pub trait CertificateProvider: Send + Sync {
    /// One-time setup, called at startup.
    async fn initialize(&self) -> Result<()>;

    async fn create(&self, request: &CertificateRequest) -> Result<()>;

    async fn delete(&self, request: &CertificateRequest) -> Result<()>;
}

/// Provider that issues nothing and records what it was asked to do.
#[derive(Debug, Default)]
pub struct FakeCertificateProvider {
    initialized: AtomicUsize,
    created: Mutex<Vec<CertificateRequest>>,
    deleted: Mutex<Vec<CertificateRequest>>,
}

impl FakeCertificateProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn initialize_calls(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn created(&self) -> Vec<CertificateRequest> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn deleted(&self) -> Vec<CertificateRequest> {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl CertificateProvider for FakeCertificateProvider {
    async fn initialize(&self) -> Result<()> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create(&self, request: &CertificateRequest) -> Result<()> {
        debug!(certificate = request.name(), host = request.host(), "Fake certificate created");
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        Ok(())
    }

    async fn delete(&self, request: &CertificateRequest) -> Result<()> {
        debug!(certificate = request.name(), "Fake certificate deleted");
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "tls_tests.rs"]
mod tls_tests;
