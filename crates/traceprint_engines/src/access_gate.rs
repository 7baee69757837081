#![forbid(unsafe_code)]

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use traceprint_contracts::ContractViolation;

pub const DEFAULT_ADMIN_REALM: &str = "Traceprint Administrative Area";

/// The externally configured admin credential pair. Comparison is exact
/// string equality; both parts must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    username: String,
    password: String,
}

impl AdminCredentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ContractViolation> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "admin_credentials.username",
                reason: "must not be empty",
            });
        }
        if password.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "admin_credentials.password",
                reason: "must not be empty",
            });
        }
        Ok(Self { username, password })
    }
}

/// Why a retrieval request was rejected. Missing and malformed credentials
/// collapse into the same challenge so the response never leaks which
/// specific check failed; only a well-formed pair that does not match gets
/// the invalid-credentials message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    ChallengeRequired,
    InvalidCredentials,
}

impl GateRejection {
    pub fn message(self) -> &'static str {
        match self {
            GateRejection::ChallengeRequired => "Restricted area.",
            GateRejection::InvalidCredentials => "Invalid credentials.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Authorized,
    Rejected(GateRejection),
}

/// Decides whether a retrieval request is authorized. Per-request and
/// stateless: no persisted session, no rate limiting, no lockout (an
/// accepted risk, documented in DESIGN.md). Constructed once at startup
/// with its credentials.
#[derive(Debug, Clone)]
pub struct AccessGate {
    credentials: AdminCredentials,
    realm: String,
}

impl AccessGate {
    pub fn new(credentials: AdminCredentials) -> Self {
        Self::with_realm(credentials, DEFAULT_ADMIN_REALM)
    }

    pub fn with_realm(credentials: AdminCredentials, realm: impl Into<String>) -> Self {
        Self {
            credentials,
            realm: realm.into(),
        }
    }

    /// The challenge value sent in `WWW-Authenticate` on every rejection.
    pub fn www_authenticate(&self) -> String {
        format!("Basic realm=\"{}\"", self.realm)
    }

    pub fn evaluate(&self, authorization: Option<&str>) -> GateDecision {
        let Some(header) = authorization else {
            return GateDecision::Rejected(GateRejection::ChallengeRequired);
        };
        let Some((scheme, encoded)) = header.split_once(' ') else {
            return GateDecision::Rejected(GateRejection::ChallengeRequired);
        };
        if scheme != "Basic" || encoded.trim().is_empty() {
            return GateDecision::Rejected(GateRejection::ChallengeRequired);
        }
        let Ok(decoded) = BASE64.decode(encoded.trim().as_bytes()) else {
            return GateDecision::Rejected(GateRejection::ChallengeRequired);
        };
        let Ok(pair) = String::from_utf8(decoded) else {
            return GateDecision::Rejected(GateRejection::ChallengeRequired);
        };
        let Some((username, password)) = pair.split_once(':') else {
            return GateDecision::Rejected(GateRejection::ChallengeRequired);
        };
        if username != self.credentials.username || password != self.credentials.password {
            return GateDecision::Rejected(GateRejection::InvalidCredentials);
        }
        GateDecision::Authorized
    }
}
