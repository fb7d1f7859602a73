// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller configuration.
//!
//! Every flag can also be set through its environment variable. The values are
//! read once at startup and handed to the controllers as plain data.

use crate::constants::{DEFAULT_DOMAIN, DEFAULT_WORKERS, METRICS_SERVER_BIND_ADDRESS};
use crate::context::Settings;
use crate::crd::DNSZone;
use crate::dns::rfc2136::TsigKey;
use anyhow::{bail, Context as _, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

/// DNS backend records are published to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DnsProviderKind {
    /// Accept every record without publishing it anywhere
    #[default]
    Fake,
    /// Dynamic updates against an authoritative server
    Rfc2136,
}

/// Backend resolving load-balancer hostnames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum HostResolverKind {
    /// System resolver configuration
    #[default]
    Dns,
    /// Static table kept in a `ConfigMap`
    ConfigMap,
}

#[derive(Clone, Debug, Parser)]
#[command(name = "glbc", version, about = "Global load-balancing controller")]
pub struct Config {
    /// Base domain of generated hostnames
    #[arg(long, env = "GLBC_DOMAIN", default_value = DEFAULT_DOMAIN)]
    pub domain: String,

    /// Keep user-supplied rule hosts next to the generated host
    #[arg(long, env = "GLBC_ENABLE_CUSTOM_HOSTS")]
    pub enable_custom_hosts: bool,

    #[arg(long, env = "GLBC_DNS_PROVIDER", value_enum, default_value_t = DnsProviderKind::Fake)]
    pub dns_provider: DnsProviderKind,

    /// Zone ids records are published to
    #[arg(long = "dns-zone", env = "GLBC_DNS_ZONES", value_delimiter = ',')]
    pub dns_zones: Vec<String>,

    /// Authoritative server receiving RFC 2136 updates (`host:port`)
    #[arg(long, env = "GLBC_RFC2136_SERVER")]
    pub rfc2136_server: Option<SocketAddr>,

    #[arg(long, env = "GLBC_TSIG_KEY_NAME")]
    pub tsig_key_name: Option<String>,

    #[arg(long, env = "GLBC_TSIG_ALGORITHM", default_value = "hmac-sha256")]
    pub tsig_algorithm: String,

    /// Base64 encoded TSIG secret
    #[arg(long, env = "GLBC_TSIG_SECRET", hide_env_values = true)]
    pub tsig_secret: Option<String>,

    /// Request certificates for generated hosts
    #[arg(long, env = "GLBC_TLS_ENABLED")]
    pub tls_enabled: bool,

    /// Serve edge-proxy snapshots of the aggregated Ingresses
    #[arg(long, env = "GLBC_EDGE_PROXY_ENABLED")]
    pub edge_proxy_enabled: bool,

    #[arg(long, env = "GLBC_HOST_RESOLVER", value_enum, default_value_t = HostResolverKind::Dns)]
    pub host_resolver: HostResolverKind,

    /// `ConfigMap` backing the `config-map` resolver (`<namespace>/<name>`)
    #[arg(long, env = "GLBC_HOST_RESOLVER_CONFIG_MAP")]
    pub host_resolver_config_map: Option<String>,

    /// Objects reconciled concurrently per controller
    #[arg(long, env = "GLBC_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: u16,

    #[arg(long, env = "GLBC_METRICS_BIND_ADDRESS", default_value = METRICS_SERVER_BIND_ADDRESS)]
    pub metrics_bind_address: SocketAddr,
}

impl Config {
    /// Configured zones, skipping blank ids.
    #[must_use]
    pub fn zones(&self) -> Vec<DNSZone> {
        self.dns_zones
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(|id| DNSZone {
                id: id.to_string(),
                tags: Default::default(),
            })
            .collect()
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            domain: self.domain.clone(),
            custom_hosts_enabled: self.enable_custom_hosts,
            zones: self.zones(),
        }
    }

    /// TSIG key for the RFC 2136 provider, if a key name is set.
    ///
    /// # Errors
    ///
    /// Returns an error when a key name is given without a secret.
    pub fn tsig_key(&self) -> Result<Option<TsigKey>> {
        let Some(name) = &self.tsig_key_name else {
            return Ok(None);
        };
        let secret = self
            .tsig_secret
            .clone()
            .with_context(|| format!("--tsig-secret is required with TSIG key {name}"))?;
        Ok(Some(TsigKey {
            name: name.clone(),
            algorithm: self.tsig_algorithm.clone(),
            secret,
        }))
    }

    /// Namespace and name of the resolver `ConfigMap`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reference is missing or not `<namespace>/<name>`.
    pub fn config_map_ref(&self) -> Result<(String, String)> {
        let Some(reference) = &self.host_resolver_config_map else {
            bail!("--host-resolver-config-map is required with the config-map resolver");
        };
        match reference.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                Ok((namespace.to_string(), name.to_string()))
            }
            _ => bail!("invalid config map reference {reference:?}, expected <namespace>/<name>"),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
