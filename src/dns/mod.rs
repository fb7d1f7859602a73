// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS publication.
//!
//! A [`Provider`] pushes one `DNSRecord` into one provider-side zone. The
//! [`ZonePublisher`](publisher::ZonePublisher) drives a provider across every
//! configured zone and folds the outcome into per-zone status conditions.
//!
//! Two providers ship with glbc:
//! - [`FakeProvider`] - accepts every call; the default when no DNS backend is configured
//! - [`Rfc2136Provider`](rfc2136::Rfc2136Provider) - dynamic updates against an
//!   authoritative server, optionally TSIG-signed

pub mod publisher;
pub mod rfc2136;

use crate::crd::{DNSRecord, DNSZone};
use crate::errors::ProviderError;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use publisher::ZonePublisher;
pub use rfc2136::Rfc2136Provider;

/// Publishes records to DNS zones.
///
/// Both operations must tolerate repeated calls with identical arguments.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Create or replace `record` in `zone`.
    async fn ensure(&self, record: &DNSRecord, zone: &DNSZone) -> Result<(), ProviderError>;

    /// Remove `record` from `zone`.
    async fn delete(&self, record: &DNSRecord, zone: &DNSZone) -> Result<(), ProviderError>;
}

/// No-op provider that accepts every call and counts them.
#[derive(Debug, Default)]
pub struct FakeProvider {
    ensure_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl FakeProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Provider for FakeProvider {
    async fn ensure(&self, _record: &DNSRecord, _zone: &DNSZone) -> Result<(), ProviderError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, _record: &DNSRecord, _zone: &DNSZone) -> Result<(), ProviderError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
