//! Idempotency-key bookkeeping for generation runs: caches the completed
//! response for a given key+payload pair and tracks keys currently in
//! flight, so a concurrent duplicate request is rejected before ever
//! reaching the database (spec §5 "idempotency key ... `RunInProgress`",
//! generalized from the teacher's `PackVerificationCache`).

use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use residency_domain::{CoreError, ErrorDetails, GenerationRequest, GenerationResponse};

#[derive(Clone)]
struct CachedRun {
    payload_hash: String,
    response: GenerationResponse,
}

/// What the caller should do with a generation request under a given
/// idempotency key.
pub enum Admission {
    /// No matching key on record; proceed with the generator.
    Proceed,
    /// The same key and payload already completed; return this response
    /// without re-running the solver (spec §5 "repeat with same key+payload
    /// returns original result").
    Cached(GenerationResponse),
}

/// In-memory registry of idempotency keys. Mirrors the persisted
/// `schedule_runs.idempotency_key` unique constraint, but can reject an
/// overlapping concurrent request before the solver ever starts.
#[derive(Clone, Default)]
pub struct RunRegistry {
    completed: Arc<DashMap<String, CachedRun>>,
    in_flight: Arc<DashMap<String, ()>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn hash_payload(request: &GenerationRequest) -> String {
        let canonical = serde_json::to_string(request).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Admits `request` under `key`: `Proceed` if this is a new run,
    /// `Cached` if it is an exact repeat, or a `Conflict`/`Invariant` error
    /// if the key is reused with a different payload or is already running
    /// (spec §5).
    pub fn admit(&self, key: &str, request: &GenerationRequest) -> Result<Admission, CoreError> {
        let hash = Self::hash_payload(request);

        if let Some(cached) = self.completed.get(key) {
            return if cached.payload_hash == hash {
                Ok(Admission::Cached(cached.response.clone()))
            } else {
                Err(CoreError::Conflict {
                    message: format!("idempotency key {key} was already used with a different request"),
                    details: ErrorDetails::from_value(serde_json::json!({ "kind": "idempotency_conflict" })),
                })
            };
        }

        if self.in_flight.contains_key(key) {
            return Err(CoreError::Conflict {
                message: format!("a generation run with idempotency key {key} is already in progress"),
                details: ErrorDetails::from_value(serde_json::json!({ "kind": "run_in_progress" })),
            });
        }

        self.in_flight.insert(key.to_string(), ());
        Ok(Admission::Proceed)
    }

    /// Records the finished response and clears the in-flight marker.
    pub fn complete(&self, key: &str, request: &GenerationRequest, response: GenerationResponse) {
        let hash = Self::hash_payload(request);
        self.completed.insert(key.to_string(), CachedRun { payload_hash: hash, response });
        self.in_flight.remove(key);
    }

    /// Clears the in-flight marker without caching a result, e.g. after the
    /// run failed and should be retryable under the same key.
    pub fn abandon(&self, key: &str) {
        self.in_flight.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use residency_domain::{Algorithm, RunStats, RunStatus, ValidationSummary};
    use uuid::Uuid;

    use super::*;

    fn request(key: &str) -> GenerationRequest {
        GenerationRequest {
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 28).unwrap(),
            algorithm: Algorithm::Hybrid,
            timeout_seconds: 60,
            pgy_levels: None,
            rotation_ids: None,
            idempotency_key: Some(key.to_string()),
            moonlighting: vec![],
        }
    }

    fn response() -> GenerationResponse {
        GenerationResponse {
            run_id: Uuid::new_v4(),
            status: RunStatus::Success,
            stats: RunStats::default(),
            validation: ValidationSummary::default(),
            nf_pc_audit: Default::default(),
            override_count: 0,
        }
    }

    #[test]
    fn repeat_with_same_payload_returns_cached() {
        let registry = RunRegistry::new();
        let req = request("abc");
        assert!(matches!(registry.admit("abc", &req), Ok(Admission::Proceed)));
        registry.complete("abc", &req, response());

        match registry.admit("abc", &req) {
            Ok(Admission::Cached(_)) => {}
            _ => panic!("expected cached admission"),
        }
    }

    #[test]
    fn repeat_with_different_payload_conflicts() {
        let registry = RunRegistry::new();
        let req = request("abc");
        registry.complete("abc", &req, response());

        let mut other = request("abc");
        other.timeout_seconds = 120;
        assert!(registry.admit("abc", &other).is_err());
    }

    #[test]
    fn concurrent_run_is_rejected() {
        let registry = RunRegistry::new();
        let req = request("abc");
        assert!(matches!(registry.admit("abc", &req), Ok(Admission::Proceed)));
        assert!(registry.admit("abc", &req).is_err());
    }
}
