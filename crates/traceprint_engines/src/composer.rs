#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use traceprint_contracts::client::ClientAttributes;
use traceprint_contracts::edge::EdgeAttributes;
use traceprint_contracts::record::{CaptureHash, ClientHash, EdgeHash, FingerprintRecord};
use traceprint_contracts::ContractViolation;

/// Header names under which the serving infrastructure forwards the edge
/// facts it observed for the request. Lookups happen on lowercased names.
pub mod edge_headers {
    pub const CONNECTING_IP: &str = "cf-connecting-ip";
    pub const USER_AGENT: &str = "user-agent";
    pub const COUNTRY: &str = "cf-ipcountry";
    pub const RAY: &str = "cf-ray";
    pub const TLS_VERSION: &str = "cf-tls-version";
    pub const TLS_CIPHER: &str = "cf-tls-cipher";
    pub const JA3_HASH: &str = "cf-ja3-hash";
}

/// Placeholder strings substituted for absent edge fields at
/// canonicalization time. These literals are part of the edge-hash input,
/// so changing one changes every hash produced afterwards.
pub mod placeholders {
    pub const IP: &str = "Unknown IP";
    pub const USER_AGENT: &str = "Unknown User-Agent";
    pub const COUNTRY: &str = "Unknown Country";
    pub const COLO: &str = "Unknown Colo";
    pub const TLS_VERSION: &str = "Unknown TLS Version";
    pub const TLS_CIPHER: &str = "Unknown TLS Cipher";
    pub const JA3_HASH: &str = "Unknown JA3 Hash";
}

#[derive(Debug)]
pub enum ComposeError {
    MalformedBody(serde_json::Error),
    Canonicalize(serde_json::Error),
    Contract(ContractViolation),
}

impl std::fmt::Display for ComposeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedBody(err) => write!(f, "capture body is not valid JSON: {err}"),
            Self::Canonicalize(err) => write!(f, "client bag canonicalization failed: {err}"),
            Self::Contract(violation) => write!(f, "contract violation: {violation:?}"),
        }
    }
}

impl std::error::Error for ComposeError {}

impl From<ContractViolation> for ComposeError {
    fn from(value: ContractViolation) -> Self {
        Self::Contract(value)
    }
}

/// Turns the two independent attribute bags into three deterministic
/// SHA-256 hashes and a storage-ready record. Pure and stateless: two
/// captures may run fully in parallel with no interaction. Constructed once
/// at startup and injected into the adapter runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintComposer;

impl FingerprintComposer {
    pub fn new() -> Self {
        Self
    }

    /// Extracts the seven edge fields from the forwarded headers. Missing,
    /// empty, or whitespace-only values become `None`. Never fails.
    pub fn normalize_edge(&self, headers: &BTreeMap<String, String>) -> EdgeAttributes {
        EdgeAttributes {
            ip: header_value(headers, edge_headers::CONNECTING_IP),
            user_agent: header_value(headers, edge_headers::USER_AGENT),
            country: header_value(headers, edge_headers::COUNTRY),
            colo: header_value(headers, edge_headers::RAY)
                .as_deref()
                .and_then(colo_from_ray),
            tls_version: header_value(headers, edge_headers::TLS_VERSION),
            tls_cipher: header_value(headers, edge_headers::TLS_CIPHER),
            ja3_hash: header_value(headers, edge_headers::JA3_HASH),
        }
    }

    /// Parses the capture body into the normalized client bag. A body that
    /// is not valid JSON fails the whole capture; nothing is persisted.
    pub fn parse_client_bag(&self, body: &str) -> Result<ClientAttributes, ComposeError> {
        let bag: serde_json::Value =
            serde_json::from_str(body).map_err(ComposeError::MalformedBody)?;
        Ok(ClientAttributes::from_bag(&bag))
    }

    /// Joins the seven edge fields in the fixed order
    /// `ip|userAgent|ja3Hash|country|colo|tlsVersion|tlsCipher`. The order
    /// is a contract, not an implementation detail.
    pub fn canonical_edge_line(&self, edge: &EdgeAttributes) -> String {
        [
            edge.ip.as_deref().unwrap_or(placeholders::IP),
            edge.user_agent.as_deref().unwrap_or(placeholders::USER_AGENT),
            edge.ja3_hash.as_deref().unwrap_or(placeholders::JA3_HASH),
            edge.country.as_deref().unwrap_or(placeholders::COUNTRY),
            edge.colo.as_deref().unwrap_or(placeholders::COLO),
            edge.tls_version.as_deref().unwrap_or(placeholders::TLS_VERSION),
            edge.tls_cipher.as_deref().unwrap_or(placeholders::TLS_CIPHER),
        ]
        .join("|")
    }

    /// Canonical JSON form of the client bag: every key present (absent
    /// values as `null`), object keys sorted. The same bag canonicalizes to
    /// the same string regardless of the key order the client sent.
    pub fn canonical_client_json(&self, client: &ClientAttributes) -> Result<String, ComposeError> {
        let value = serde_json::to_value(client).map_err(ComposeError::Canonicalize)?;
        serde_json::to_string(&value).map_err(ComposeError::Canonicalize)
    }

    /// SHA-256 over the canonical string, as lowercase hex.
    pub fn digest_hex(&self, input: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn edge_hash(&self, edge: &EdgeAttributes) -> Result<EdgeHash, ComposeError> {
        Ok(EdgeHash::new(self.digest_hex(&self.canonical_edge_line(edge)))?)
    }

    pub fn client_hash(&self, client: &ClientAttributes) -> Result<ClientHash, ComposeError> {
        Ok(ClientHash::new(
            self.digest_hex(&self.canonical_client_json(client)?),
        )?)
    }

    /// `digest(edge_hex || client_hex)`: the two hex digests concatenated,
    /// then digested again.
    pub fn compose_capture_hash(
        &self,
        edge_hash: &EdgeHash,
        client_hash: &ClientHash,
    ) -> Result<CaptureHash, ComposeError> {
        let mut combined = String::with_capacity(128);
        combined.push_str(edge_hash.as_str());
        combined.push_str(client_hash.as_str());
        Ok(CaptureHash::new(self.digest_hex(&combined))?)
    }

    /// Assembles the storage-ready record. Never partially fills: any
    /// failure aborts the whole capture.
    pub fn build_record(
        &self,
        captured_at: DateTime<Utc>,
        edge: EdgeAttributes,
        client: ClientAttributes,
    ) -> Result<FingerprintRecord, ComposeError> {
        let edge_hash = self.edge_hash(&edge)?;
        let client_hash = self.client_hash(&client)?;
        let capture_hash = self.compose_capture_hash(&edge_hash, &client_hash)?;
        Ok(FingerprintRecord::v1(
            captured_at,
            edge,
            client,
            edge_hash,
            client_hash,
            capture_hash,
        )?)
    }

    /// Recomputes all three hashes from a stored record. A stored row must
    /// reproduce its own hashes exactly.
    pub fn recompute_hashes(
        &self,
        record: &FingerprintRecord,
    ) -> Result<(EdgeHash, ClientHash, CaptureHash), ComposeError> {
        let edge_hash = self.edge_hash(&record.edge)?;
        let client_hash = self.client_hash(&record.client)?;
        let capture_hash = self.compose_capture_hash(&edge_hash, &client_hash)?;
        Ok((edge_hash, client_hash, capture_hash))
    }
}

fn header_value(headers: &BTreeMap<String, String>, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn colo_from_ray(ray: &str) -> Option<String> {
    ray.rsplit_once('-')
        .map(|(_, colo)| colo.trim())
        .filter(|colo| !colo.is_empty())
        .map(str::to_string)
}
