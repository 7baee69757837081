#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};

use crate::client::ClientAttributes;
use crate::edge::EdgeAttributes;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const RECORD_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

fn validate_hash_hex(field: &'static str, value: &str) -> Result<(), ContractViolation> {
    if value.len() != 64 || !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be lowercase hex sha256 (64 chars)",
        });
    }
    Ok(())
}

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct EdgeHash(String);

impl EdgeHash {
    pub fn new(hex: impl Into<String>) -> Result<Self, ContractViolation> {
        let hex = hex.into();
        validate_hash_hex("edge_hash", &hex)?;
        Ok(Self(hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for EdgeHash {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_hash_hex("edge_hash", &self.0)
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ClientHash(String);

impl ClientHash {
    pub fn new(hex: impl Into<String>) -> Result<Self, ContractViolation> {
        let hex = hex.into();
        validate_hash_hex("client_hash", &hex)?;
        Ok(Self(hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for ClientHash {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_hash_hex("client_hash", &self.0)
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct CaptureHash(String);

impl CaptureHash {
    pub fn new(hex: impl Into<String>) -> Result<Self, ContractViolation> {
        let hex = hex.into();
        validate_hash_hex("capture_hash", &hex)?;
        Ok(Self(hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for CaptureHash {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_hash_hex("capture_hash", &self.0)
    }
}

/// One persisted fingerprinting event. Created once per capture request and
/// never mutated; the store exclusively owns persisted rows.
///
/// `capture_hash` is a pure function of `(edge_hash, client_hash)`;
/// `edge_hash` of the seven edge fields in their fixed concatenation order;
/// `client_hash` of the serialized client bag. Recomputing all three from a
/// stored row must reproduce the stored values exactly.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintRecord {
    pub schema_version: SchemaVersion,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub edge: EdgeAttributes,
    #[serde(flatten)]
    pub client: ClientAttributes,
    pub edge_hash: EdgeHash,
    pub client_hash: ClientHash,
    pub capture_hash: CaptureHash,
}

impl FingerprintRecord {
    pub fn v1(
        timestamp: DateTime<Utc>,
        edge: EdgeAttributes,
        client: ClientAttributes,
        edge_hash: EdgeHash,
        client_hash: ClientHash,
        capture_hash: CaptureHash,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: RECORD_CONTRACT_VERSION,
            timestamp,
            edge,
            client,
            edge_hash,
            client_hash,
            capture_hash,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for FingerprintRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != RECORD_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "fingerprint_record.schema_version",
                reason: "must match RECORD_CONTRACT_VERSION",
            });
        }
        self.edge.validate()?;
        self.edge_hash.validate()?;
        self.client_hash.validate()?;
        self.capture_hash.validate()?;
        Ok(())
    }
}
