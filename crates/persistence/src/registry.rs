//! In-memory call registry.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use phone_agent_core::CallIds;

use crate::PersistenceError;

/// Session registration: exactly one `start_call` and one `end_call`
/// per phone call.
#[async_trait]
pub trait CallRegistry: Send + Sync {
    /// Register a new call; returns the identifiers the turn engine
    /// carries for its lifetime.
    async fn start_call(&self, call_uuid: &str, phone: &str)
        -> Result<CallIds, PersistenceError>;

    /// Mark the call ended.
    async fn end_call(&self, call_id: &str) -> Result<(), PersistenceError>;
}

/// Raw numbers never leave the transport boundary; profiles key on the
/// hash.
fn hash_phone(phone: &str) -> String {
    let digest = Sha256::digest(phone.as_bytes());
    format!("{digest:x}")
}

#[derive(Debug, Clone)]
struct CallerProfile {
    caller_id: String,
    total_calls: u64,
    last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CallRecord {
    call_uuid: String,
    phone_hash: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

/// Registry backed by process memory.
#[derive(Default)]
pub struct InMemoryCallRegistry {
    callers: RwLock<HashMap<String, CallerProfile>>,
    calls: RwLock<HashMap<String, CallRecord>>,
}

impl InMemoryCallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls registered and not yet ended.
    pub fn active_calls(&self) -> usize {
        self.calls
            .read()
            .values()
            .filter(|c| c.ended_at.is_none())
            .count()
    }

    /// Lifetime call count for a caller.
    pub fn total_calls_for(&self, phone: &str) -> u64 {
        self.callers
            .read()
            .get(&hash_phone(phone))
            .map(|p| p.total_calls)
            .unwrap_or(0)
    }

    /// Calls currently in progress for one caller.
    pub fn active_calls_for(&self, phone: &str) -> usize {
        let hash = hash_phone(phone);
        self.calls
            .read()
            .values()
            .filter(|c| c.phone_hash == hash && c.ended_at.is_none())
            .count()
    }

    /// When the caller was last heard from.
    pub fn last_seen(&self, phone: &str) -> Option<DateTime<Utc>> {
        self.callers.read().get(&hash_phone(phone)).map(|p| p.last_seen)
    }
}

#[async_trait]
impl CallRegistry for InMemoryCallRegistry {
    async fn start_call(
        &self,
        call_uuid: &str,
        phone: &str,
    ) -> Result<CallIds, PersistenceError> {
        let phone_hash = hash_phone(phone);

        let caller_id = {
            let mut callers = self.callers.write();
            let profile = callers.entry(phone_hash.clone()).or_insert_with(|| CallerProfile {
                caller_id: uuid::Uuid::new_v4().to_string(),
                total_calls: 0,
                last_seen: Utc::now(),
            });
            profile.total_calls += 1;
            profile.last_seen = Utc::now();
            profile.caller_id.clone()
        };

        let call_id = uuid::Uuid::new_v4().to_string();
        self.calls.write().insert(
            call_id.clone(),
            CallRecord {
                call_uuid: call_uuid.to_string(),
                phone_hash,
                started_at: Utc::now(),
                ended_at: None,
            },
        );

        tracing::debug!(call_uuid, call_id, "call registered");
        Ok(CallIds { call_id, caller_id })
    }

    async fn end_call(&self, call_id: &str) -> Result<(), PersistenceError> {
        let mut calls = self.calls.write();
        let record = calls
            .get_mut(call_id)
            .ok_or_else(|| PersistenceError::CallNotFound(call_id.to_string()))?;
        record.ended_at = Some(Utc::now());
        tracing::debug!(
            call_uuid = %record.call_uuid,
            call_id,
            duration_s = (Utc::now() - record.started_at).num_seconds(),
            "call ended"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_repeat_caller_keeps_profile() {
        let registry = InMemoryCallRegistry::new();

        let first = registry.start_call("uuid-1", "5551234").await.unwrap();
        let second = registry.start_call("uuid-2", "5551234").await.unwrap();

        assert_eq!(first.caller_id, second.caller_id);
        assert_ne!(first.call_id, second.call_id);
        assert_eq!(registry.total_calls_for("5551234"), 2);
        assert_eq!(registry.total_calls_for("5559999"), 0);
        assert!(registry.last_seen("5551234").is_some());
    }

    #[tokio::test]
    async fn test_end_call_marks_record() {
        let registry = InMemoryCallRegistry::new();

        let ids = registry.start_call("uuid-1", "5551234").await.unwrap();
        assert_eq!(registry.active_calls(), 1);
        assert_eq!(registry.active_calls_for("5551234"), 1);

        registry.end_call(&ids.call_id).await.unwrap();
        assert_eq!(registry.active_calls(), 0);
        assert_eq!(registry.active_calls_for("5551234"), 0);
    }

    #[tokio::test]
    async fn test_end_unknown_call_is_an_error() {
        let registry = InMemoryCallRegistry::new();
        assert!(registry.end_call("nope").await.is_err());
    }

    #[test]
    fn test_phone_hash_is_stable_and_opaque() {
        let a = hash_phone("5551234");
        let b = hash_phone("5551234");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(!a.contains("5551234"));
    }
}
