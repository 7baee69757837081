#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use traceprint_contracts::record::FingerprintRecord;
use traceprint_contracts::Validate;
use traceprint_engines::access_gate::{AccessGate, AdminCredentials, GateDecision};
use traceprint_engines::composer::{ComposeError, FingerprintComposer};
use traceprint_storage::FingerprintStore;

/// The listing endpoint returns at most this many rows, newest first.
pub const ADMIN_LIST_ROW_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureAdapterResponse {
    pub status: String,
    pub capture_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterHealthResponse {
    pub status: String,
    pub stored_count: u64,
}

/// How a capture request failed. `MalformedBody` is the caller's fault and
/// maps to a client error; everything else is an internal failure and maps
/// to a server error. Nothing is persisted on either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFailure {
    MalformedBody(String),
    Internal(String),
}

impl std::fmt::Display for CaptureFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedBody(reason) => write!(f, "malformed capture body: {reason}"),
            Self::Internal(reason) => write!(f, "capture failed: {reason}"),
        }
    }
}

impl std::error::Error for CaptureFailure {}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminListOutcome {
    Authorized(Vec<FingerprintRecord>),
    Rejected {
        message: &'static str,
        challenge: String,
    },
}

#[derive(Debug, Clone)]
struct AdapterPersistenceConfig {
    journal_path: PathBuf,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct AdapterJournalEntry {
    schema_version: u8,
    record: FingerprintRecord,
}

impl AdapterJournalEntry {
    fn v1(record: FingerprintRecord) -> Self {
        Self {
            schema_version: 1,
            record,
        }
    }
}

/// Owns the injected composer, gate, and shared store, and exposes the two
/// request paths as plain methods so the HTTP handlers stay thin. When a
/// journal path is configured, every stored row is appended to it as one
/// JSON line and replayed into the store at startup.
#[derive(Debug, Clone)]
pub struct AdapterRuntime {
    composer: FingerprintComposer,
    gate: AccessGate,
    store: Arc<Mutex<FingerprintStore>>,
    persistence: Option<AdapterPersistenceConfig>,
}

impl AdapterRuntime {
    pub fn new(
        composer: FingerprintComposer,
        gate: AccessGate,
        store: Arc<Mutex<FingerprintStore>>,
    ) -> Self {
        Self {
            composer,
            gate,
            store,
            persistence: None,
        }
    }

    pub fn new_with_persistence(
        composer: FingerprintComposer,
        gate: AccessGate,
        store: Arc<Mutex<FingerprintStore>>,
        journal_path: PathBuf,
    ) -> Result<Self, String> {
        let runtime = Self {
            composer,
            gate,
            store,
            persistence: Some(AdapterPersistenceConfig { journal_path }),
        };
        runtime.ensure_persistence_ready()?;
        runtime.replay_journal_into_store()?;
        Ok(runtime)
    }

    /// Builds the runtime from environment configuration. The admin
    /// credential pair is required; the journal path is optional and its
    /// absence means a volatile in-memory store.
    pub fn default_from_env() -> Result<Self, String> {
        let username = require_env("TRACEPRINT_ADMIN_USER")?;
        let password = require_env("TRACEPRINT_ADMIN_PASS")?;
        let credentials = AdminCredentials::new(username, password)
            .map_err(|err| format!("invalid admin credentials: {err:?}"))?;
        let composer = FingerprintComposer::new();
        let gate = AccessGate::new(credentials);
        let store = Arc::new(Mutex::new(FingerprintStore::new_in_memory()));

        let journal_path = env::var("TRACEPRINT_STORE_PATH")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        match journal_path {
            Some(path) => Self::new_with_persistence(composer, gate, store, path),
            None => Ok(Self::new(composer, gate, store)),
        }
    }

    /// The capture path: normalize both bags, compose the hashes, persist
    /// the record. A body that is not valid JSON aborts the capture before
    /// the store is touched.
    pub fn run_capture(
        &self,
        now: DateTime<Utc>,
        headers: &BTreeMap<String, String>,
        body: &str,
    ) -> Result<CaptureAdapterResponse, CaptureFailure> {
        let client = self.composer.parse_client_bag(body).map_err(|err| match err {
            ComposeError::MalformedBody(_) => CaptureFailure::MalformedBody(err.to_string()),
            other => CaptureFailure::Internal(other.to_string()),
        })?;
        let edge = self.composer.normalize_edge(headers);
        let record = self
            .composer
            .build_record(now, edge, client)
            .map_err(|err| CaptureFailure::Internal(err.to_string()))?;

        {
            let mut store = self
                .store
                .lock()
                .map_err(|_| CaptureFailure::Internal("adapter store lock poisoned".to_string()))?;
            store
                .append_fingerprint_row(record.clone())
                .map_err(|err| {
                    CaptureFailure::Internal(format!("store rejected capture row: {err:?}"))
                })?;
        }
        self.append_journal_entry(&record)
            .map_err(CaptureFailure::Internal)?;

        Ok(CaptureAdapterResponse {
            status: "ok".to_string(),
            capture_hash: record.capture_hash.as_str().to_string(),
        })
    }

    /// The list path: the gate decides, then the store is queried newest
    /// first with the row limit applied.
    pub fn run_admin_list(
        &self,
        authorization: Option<&str>,
    ) -> Result<AdminListOutcome, String> {
        match self.gate.evaluate(authorization) {
            GateDecision::Rejected(rejection) => Ok(AdminListOutcome::Rejected {
                message: rejection.message(),
                challenge: self.gate.www_authenticate(),
            }),
            GateDecision::Authorized => {
                let store = self
                    .store
                    .lock()
                    .map_err(|_| "adapter store lock poisoned".to_string())?;
                let rows = store
                    .recent_fingerprint_rows(ADMIN_LIST_ROW_LIMIT)
                    .into_iter()
                    .cloned()
                    .collect();
                Ok(AdminListOutcome::Authorized(rows))
            }
        }
    }

    pub fn health_report(&self) -> Result<AdapterHealthResponse, String> {
        let store = self
            .store
            .lock()
            .map_err(|_| "adapter store lock poisoned".to_string())?;
        Ok(AdapterHealthResponse {
            status: "ok".to_string(),
            stored_count: store.fingerprint_row_count() as u64,
        })
    }

    fn ensure_persistence_ready(&self) -> Result<(), String> {
        let Some(persistence) = self.persistence.as_ref() else {
            return Ok(());
        };
        let path = &persistence.journal_path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "failed to create store directory '{}': {}",
                    parent.display(),
                    err
                )
            })?;
        }
        if !path.exists() {
            File::create(path).map_err(|err| {
                format!("failed to create store journal '{}': {}", path.display(), err)
            })?;
        }
        Ok(())
    }

    fn replay_journal_into_store(&self) -> Result<(), String> {
        let Some(persistence) = self.persistence.as_ref() else {
            return Ok(());
        };
        let path = &persistence.journal_path;
        let file = File::open(path)
            .map_err(|err| format!("failed to open store journal '{}': {}", path.display(), err))?;
        let mut store = self
            .store
            .lock()
            .map_err(|_| "adapter store lock poisoned".to_string())?;
        for (line_no, line_result) in BufReader::new(file).lines().enumerate() {
            let line = line_result.map_err(|err| {
                format!(
                    "failed reading store journal '{}' at line {}: {}",
                    path.display(),
                    line_no + 1,
                    err
                )
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AdapterJournalEntry = serde_json::from_str(&line).map_err(|err| {
                format!(
                    "failed parsing store journal '{}' at line {}: {}",
                    path.display(),
                    line_no + 1,
                    err
                )
            })?;
            if entry.schema_version != 1 {
                return Err(format!(
                    "unsupported journal schema version {} at line {}",
                    entry.schema_version,
                    line_no + 1
                ));
            }
            entry.record.validate().map_err(|err| {
                format!(
                    "invalid journaled record at line {}: {:?}",
                    line_no + 1,
                    err
                )
            })?;
            store.append_fingerprint_row(entry.record).map_err(|err| {
                format!(
                    "failed replaying journaled record at line {}: {:?}",
                    line_no + 1,
                    err
                )
            })?;
        }
        Ok(())
    }

    fn append_journal_entry(&self, record: &FingerprintRecord) -> Result<(), String> {
        let Some(persistence) = self.persistence.as_ref() else {
            return Ok(());
        };
        let path = &persistence.journal_path;
        let entry = AdapterJournalEntry::v1(record.clone());
        let serialized = serde_json::to_string(&entry)
            .map_err(|err| format!("failed serializing journal entry: {err}"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| {
                format!("failed to open store journal '{}': {}", path.display(), err)
            })?;
        writeln!(file, "{serialized}")
            .map_err(|err| format!("failed appending to store journal: {err}"))?;
        Ok(())
    }
}

fn require_env(key: &str) -> Result<String, String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("{key} must be set"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use chrono::TimeZone;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn test_store() -> Arc<Mutex<FingerprintStore>> {
        Arc::new(Mutex::new(FingerprintStore::new_in_memory()))
    }

    fn test_gate() -> AccessGate {
        AccessGate::new(AdminCredentials::new("operator", "hunter2").unwrap())
    }

    fn test_runtime() -> AdapterRuntime {
        AdapterRuntime::new(FingerprintComposer::new(), test_gate(), test_store())
    }

    fn capture_headers() -> BTreeMap<String, String> {
        BTreeMap::from([(
            "cf-connecting-ip".to_string(),
            "1.2.3.4".to_string(),
        )])
    }

    fn basic(pair: &str) -> String {
        format!("Basic {}", BASE64.encode(pair.as_bytes()))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn temp_journal(name: &str) -> (PathBuf, PathBuf) {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(1);
        let base = std::env::temp_dir().join(format!("traceprint-journal-test-{name}-{suffix}"));
        let journal = base.join("fingerprints.jsonl");
        (base, journal)
    }

    #[test]
    fn at_adapter_01_capture_scenario_stores_row() {
        let runtime = test_runtime();
        let response = runtime
            .run_capture(
                at(100),
                &capture_headers(),
                r#"{"userAgent":"TestAgent","screen":{"width":1024,"height":768}}"#,
            )
            .unwrap();

        assert_eq!(response.status, "ok");
        assert_eq!(response.capture_hash.len(), 64);
        assert!(response
            .capture_hash
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));

        let rows = match runtime.run_admin_list(Some(&basic("operator:hunter2"))).unwrap() {
            AdminListOutcome::Authorized(rows) => rows,
            other => panic!("expected authorized listing, got {other:?}"),
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].edge.ip.as_deref(), Some("1.2.3.4"));
        assert_eq!(rows[0].client.front_user_agent.as_deref(), Some("TestAgent"));
        assert_eq!(rows[0].client.screen_width, Some(1024));
        assert_eq!(rows[0].capture_hash.as_str(), response.capture_hash);
    }

    #[test]
    fn at_adapter_02_malformed_body_leaves_store_untouched() {
        let runtime = test_runtime();
        let err = runtime
            .run_capture(at(100), &capture_headers(), "not json at all")
            .unwrap_err();
        assert!(matches!(err, CaptureFailure::MalformedBody(_)));
        assert_eq!(runtime.health_report().unwrap().stored_count, 0);
    }

    #[test]
    fn at_adapter_03_admin_list_requires_credentials() {
        let runtime = test_runtime();

        match runtime.run_admin_list(None).unwrap() {
            AdminListOutcome::Rejected { message, challenge } => {
                assert_eq!(message, "Restricted area.");
                assert!(challenge.starts_with("Basic realm="));
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        match runtime
            .run_admin_list(Some(&basic("wronguser:wrongpass")))
            .unwrap()
        {
            AdminListOutcome::Rejected { message, .. } => {
                assert_eq!(message, "Invalid credentials.")
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        assert!(matches!(
            runtime.run_admin_list(Some(&basic("operator:hunter2"))).unwrap(),
            AdminListOutcome::Authorized(_)
        ));
    }

    #[test]
    fn at_adapter_04_admin_list_is_newest_first_and_bounded() {
        let runtime = test_runtime();
        for i in 0..(ADMIN_LIST_ROW_LIMIT as i64 + 5) {
            runtime
                .run_capture(
                    at(i),
                    &capture_headers(),
                    &format!(r#"{{"timezone":"Zone/{i}"}}"#),
                )
                .unwrap();
        }

        let rows = match runtime.run_admin_list(Some(&basic("operator:hunter2"))).unwrap() {
            AdminListOutcome::Authorized(rows) => rows,
            other => panic!("expected authorized listing, got {other:?}"),
        };
        assert_eq!(rows.len(), ADMIN_LIST_ROW_LIMIT);
        assert_eq!(rows[0].timestamp, at(ADMIN_LIST_ROW_LIMIT as i64 + 4));
        assert!(rows.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn at_adapter_05_listed_row_reproduces_its_hashes() {
        let runtime = test_runtime();
        runtime
            .run_capture(
                at(7),
                &capture_headers(),
                r#"{"userAgent":"TestAgent","language":"en-US"}"#,
            )
            .unwrap();

        let rows = match runtime.run_admin_list(Some(&basic("operator:hunter2"))).unwrap() {
            AdminListOutcome::Authorized(rows) => rows,
            other => panic!("expected authorized listing, got {other:?}"),
        };
        let composer = FingerprintComposer::new();
        let (edge_hash, client_hash, capture_hash) =
            composer.recompute_hashes(&rows[0]).unwrap();
        assert_eq!(edge_hash, rows[0].edge_hash);
        assert_eq!(client_hash, rows[0].client_hash);
        assert_eq!(capture_hash, rows[0].capture_hash);
    }

    #[test]
    fn at_adapter_06_journal_replay_restores_rows() {
        let (base, journal) = temp_journal("replay");

        let first = AdapterRuntime::new_with_persistence(
            FingerprintComposer::new(),
            test_gate(),
            test_store(),
            journal.clone(),
        )
        .unwrap();
        first
            .run_capture(at(10), &capture_headers(), r#"{"timezone":"UTC"}"#)
            .unwrap();
        first
            .run_capture(at(20), &capture_headers(), r#"{"timezone":"America/Sao_Paulo"}"#)
            .unwrap();

        let restored = AdapterRuntime::new_with_persistence(
            FingerprintComposer::new(),
            test_gate(),
            test_store(),
            journal,
        )
        .unwrap();
        assert_eq!(restored.health_report().unwrap().stored_count, 2);

        let rows = match restored
            .run_admin_list(Some(&basic("operator:hunter2")))
            .unwrap()
        {
            AdminListOutcome::Authorized(rows) => rows,
            other => panic!("expected authorized listing, got {other:?}"),
        };
        assert_eq!(rows[0].timestamp, at(20));
        assert_eq!(rows[1].timestamp, at(10));

        std::fs::remove_dir_all(base).unwrap();
    }
}
