// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! RFC 2136 dynamic-update provider.
//!
//! `ensure` replaces the record's RRsets in the zone with a single UPDATE: every
//! managed RRset for the name is deleted and the desired sets are added in the
//! same message, so the server applies both or neither. `A` records are
//! split into an `A` set for IPv4 targets and an `AAAA` set for IPv6 targets.
//! Zone ids are zone origins (`hcpapps.net`).

use super::Provider;
use crate::constants::{DNS_RECORD_TTL_SECS, TSIG_FUDGE_TIME_SECS};
use crate::crd::{DNSRecord, DNSZone, RecordType};
use crate::errors::ProviderError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hickory_client::client::{Client, SyncClient};
use hickory_client::op::{Message, MessageType, OpCode, Query, ResponseCode, UpdateMessage};
use hickory_client::rr::rdata::tsig::TsigAlgorithm;
use hickory_client::rr::rdata::{CNAME, NULL};
use hickory_client::rr::{DNSClass, Name, RData, Record, RecordSet, RecordType as DnsRecordType};
use hickory_client::udp::UdpClientConnection;
use hickory_proto::rr::dnssec::tsig::TSigner;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use tracing::{debug, info};

/// TSIG credentials for signed updates.
#[derive(Clone, Debug)]
pub struct TsigKey {
    pub name: String,
    /// Algorithm name as written in BIND key files (`hmac-sha256`).
    pub algorithm: String,
    /// Base64 encoded secret.
    pub secret: String,
}

/// Map a BIND-style algorithm name to the TSIG algorithm.
///
/// # Errors
///
/// Returns [`ProviderError::InvalidTsigKey`] for unsupported algorithms.
pub fn parse_tsig_algorithm(key_name: &str, algorithm: &str) -> Result<TsigAlgorithm, ProviderError> {
    match algorithm.trim_end_matches('.').to_ascii_lowercase().as_str() {
        "hmac-md5" | "hmac-md5.sig-alg.reg.int" => Ok(TsigAlgorithm::HmacMd5),
        "hmac-sha1" => Ok(TsigAlgorithm::HmacSha1),
        "hmac-sha224" => Ok(TsigAlgorithm::HmacSha224),
        "hmac-sha256" => Ok(TsigAlgorithm::HmacSha256),
        "hmac-sha384" => Ok(TsigAlgorithm::HmacSha384),
        "hmac-sha512" => Ok(TsigAlgorithm::HmacSha512),
        other => Err(ProviderError::InvalidTsigKey {
            key_name: key_name.to_string(),
            reason: format!("unsupported algorithm '{other}'"),
        }),
    }
}

fn create_tsig_signer(key: &TsigKey) -> Result<TSigner, ProviderError> {
    let invalid = |reason: String| ProviderError::InvalidTsigKey {
        key_name: key.name.clone(),
        reason,
    };

    let algorithm = parse_tsig_algorithm(&key.name, &key.algorithm)?;
    let key_bytes = BASE64
        .decode(&key.secret)
        .map_err(|e| invalid(format!("secret is not base64: {e}")))?;
    let key_name = Name::from_str(&key.name).map_err(|e| invalid(e.to_string()))?;

    TSigner::new(
        key_bytes,
        algorithm,
        key_name,
        u16::try_from(TSIG_FUDGE_TIME_SECS).unwrap_or(300),
    )
    .map_err(|e| invalid(e.to_string()))
}

/// Parse a name as fully qualified.
fn fqdn(name: &str) -> Result<Name, ProviderError> {
    let mut parsed = Name::from_str(name).map_err(|e| ProviderError::InvalidName {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    parsed.set_fqdn(true);
    Ok(parsed)
}

/// RRset types owned by a record of the given type.
#[must_use]
pub fn managed_types(record_type: RecordType) -> &'static [DnsRecordType] {
    match record_type {
        RecordType::A => &[DnsRecordType::A, DnsRecordType::AAAA],
        RecordType::Cname => &[DnsRecordType::CNAME],
    }
}

/// Build the record owner name and the non-empty RRsets for `record` in `zone`.
///
/// # Errors
///
/// Returns an error when a name is invalid, the record lies outside the zone or
/// a target does not fit the record type.
pub fn desired_record_sets(
    record: &DNSRecord,
    zone: &DNSZone,
) -> Result<(Name, Name, Vec<RecordSet>), ProviderError> {
    let origin = fqdn(&zone.id)?;
    let name = fqdn(&record.spec.dns_name)?;
    if !origin.zone_of(&name) {
        return Err(ProviderError::InvalidName {
            name: record.spec.dns_name.clone(),
            reason: format!("not in zone {}", zone.id),
        });
    }

    let ttl = u32::try_from(record.spec.record_ttl)
        .unwrap_or_else(|_| u32::try_from(DNS_RECORD_TTL_SECS).unwrap_or(60));
    let invalid_target = |target: &str| ProviderError::InvalidTarget {
        name: record.spec.dns_name.clone(),
        record_type: record.spec.record_type.to_string(),
        target: target.to_string(),
    };

    let mut sets = Vec::new();
    match record.spec.record_type {
        RecordType::A => {
            let mut v4 = RecordSet::with_ttl(name.clone(), DnsRecordType::A, ttl);
            let mut v6 = RecordSet::with_ttl(name.clone(), DnsRecordType::AAAA, ttl);
            for target in &record.spec.targets {
                match IpAddr::from_str(target).map_err(|_| invalid_target(target))? {
                    IpAddr::V4(ip) => v4.add_rdata(RData::A(ip.into())),
                    IpAddr::V6(ip) => v6.add_rdata(RData::AAAA(ip.into())),
                };
            }
            sets.extend([v4, v6].into_iter().filter(|s| !s.is_empty()));
        }
        RecordType::Cname => {
            let [target] = record.spec.targets.as_slice() else {
                return Err(invalid_target(&record.spec.targets.join(",")));
            };
            let alias = fqdn(target).map_err(|_| invalid_target(target))?;
            let mut set = RecordSet::with_ttl(name.clone(), DnsRecordType::CNAME, ttl);
            set.add_rdata(RData::CNAME(CNAME(alias)));
            sets.push(set);
        }
    }

    for set in &mut sets {
        set.set_dns_class(DNSClass::IN);
    }
    Ok((origin, name, sets))
}

/// Build the UPDATE replacing the `types` RRsets of `name` with `sets`.
///
/// Each managed type gets a delete-RRset entry (class ANY, TTL 0, empty rdata),
/// followed by the records of every desired set.
#[must_use]
pub fn build_update(
    origin: &Name,
    name: &Name,
    types: &[DnsRecordType],
    sets: Vec<RecordSet>,
) -> Message {
    let mut zone = Query::new();
    zone.set_name(origin.clone())
        .set_query_class(DNSClass::IN)
        .set_query_type(DnsRecordType::SOA);

    let mut message = Message::new();
    message
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .set_recursion_desired(false);
    message.add_zone(zone);

    for record_type in types {
        let mut delete = Record::with(name.clone(), *record_type, 0);
        delete.set_dns_class(DNSClass::ANY);
        delete.set_data(Some(RData::NULL(NULL::new())));
        message.add_update(delete);
    }
    for set in sets {
        message.add_updates(set);
    }
    message
}

/// Dynamic DNS provider talking to one authoritative server over UDP.
#[derive(Clone, Debug)]
pub struct Rfc2136Provider {
    server: SocketAddr,
    key: Option<TsigKey>,
}

impl Rfc2136Provider {
    /// Create a provider for `server`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidTsigKey`] when the key cannot be used.
    pub fn new(server: SocketAddr, key: Option<TsigKey>) -> Result<Self, ProviderError> {
        if let Some(key) = &key {
            create_tsig_signer(key)?;
        }
        Ok(Self { server, key })
    }

    fn client(&self) -> Result<SyncClient<UdpClientConnection>, ProviderError> {
        let conn = UdpClientConnection::new(self.server).map_err(|e| ProviderError::Transport {
            server: self.server.to_string(),
            reason: e.to_string(),
        })?;
        Ok(match &self.key {
            Some(key) => SyncClient::with_tsigner(conn, create_tsig_signer(key)?),
            None => SyncClient::new(conn),
        })
    }

    /// Replace the managed RRsets of `record` with its desired sets, or with
    /// nothing when `append` is false.
    async fn replace(
        &self,
        record: &DNSRecord,
        zone: &DNSZone,
        append: bool,
    ) -> Result<(), ProviderError> {
        let (origin, name, sets) = desired_record_sets(record, zone)?;
        let sets = if append { sets } else { Vec::new() };
        let message = build_update(&origin, &name, managed_types(record.spec.record_type), sets);
        let provider = self.clone();
        let zone_id = zone.id.clone();

        tokio::task::spawn_blocking(move || {
            let client = provider.client()?;
            info!(
                name = %name,
                zone = %zone_id,
                updates = message.updates().len(),
                "Sending DNS update"
            );
            let response = client
                .send(message)
                .into_iter()
                .next()
                .ok_or_else(|| provider.transport_error(&"no response to update"))?
                .map_err(|e| provider.transport_error(&e))?;
            debug!(name = %name, code = ?response.response_code(), "DNS update answered");
            provider.check(&name, &zone_id, response.response_code())
        })
        .await
        .map_err(|e| ProviderError::Transport {
            server: self.server.to_string(),
            reason: format!("update task failed: {e}"),
        })?
    }

    fn transport_error(&self, err: &impl std::fmt::Display) -> ProviderError {
        ProviderError::Transport {
            server: self.server.to_string(),
            reason: err.to_string(),
        }
    }

    fn check(&self, name: &Name, zone: &str, code: ResponseCode) -> Result<(), ProviderError> {
        if code == ResponseCode::NoError {
            return Ok(());
        }
        Err(ProviderError::UpdateRejected {
            name: name.to_string(),
            zone: zone.to_string(),
            server: self.server.to_string(),
            code: format!("{code:?}"),
        })
    }
}

#[async_trait::async_trait]
impl Provider for Rfc2136Provider {
    async fn ensure(&self, record: &DNSRecord, zone: &DNSZone) -> Result<(), ProviderError> {
        self.replace(record, zone, true).await
    }

    async fn delete(&self, record: &DNSRecord, zone: &DNSZone) -> Result<(), ProviderError> {
        self.replace(record, zone, false).await
    }
}

#[cfg(test)]
#[path = "rfc2136_tests.rs"]
mod rfc2136_tests;
