#![forbid(unsafe_code)]

use crate::common::validate_opt_field;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const EDGE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

const MAX_EDGE_FIELD_LEN: usize = 2048;

/// Server-observed per-request facts. Every field is optional: the serving
/// infrastructure supplies what it can, and absence is carried as `None`
/// rather than a sentinel string. Immutable once captured; lifetime is one
/// request.
#[derive(
    Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(default, rename_all = "camelCase")]
pub struct EdgeAttributes {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub colo: Option<String>,
    pub tls_version: Option<String>,
    pub tls_cipher: Option<String>,
    pub ja3_hash: Option<String>,
}

impl EdgeAttributes {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        ip: Option<String>,
        user_agent: Option<String>,
        country: Option<String>,
        colo: Option<String>,
        tls_version: Option<String>,
        tls_cipher: Option<String>,
        ja3_hash: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let e = Self {
            ip,
            user_agent,
            country,
            colo,
            tls_version,
            tls_cipher,
            ja3_hash,
        };
        e.validate()?;
        Ok(e)
    }
}

impl Validate for EdgeAttributes {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_opt_field("edge_attributes.ip", &self.ip, MAX_EDGE_FIELD_LEN)?;
        validate_opt_field(
            "edge_attributes.user_agent",
            &self.user_agent,
            MAX_EDGE_FIELD_LEN,
        )?;
        validate_opt_field("edge_attributes.country", &self.country, MAX_EDGE_FIELD_LEN)?;
        validate_opt_field("edge_attributes.colo", &self.colo, MAX_EDGE_FIELD_LEN)?;
        validate_opt_field(
            "edge_attributes.tls_version",
            &self.tls_version,
            MAX_EDGE_FIELD_LEN,
        )?;
        validate_opt_field(
            "edge_attributes.tls_cipher",
            &self.tls_cipher,
            MAX_EDGE_FIELD_LEN,
        )?;
        validate_opt_field(
            "edge_attributes.ja3_hash",
            &self.ja3_hash,
            MAX_EDGE_FIELD_LEN,
        )?;
        Ok(())
    }
}
