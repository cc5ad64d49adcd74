//! Per-worker session registry.
//!
//! Maps session key to the record of the session assigned to that worker.
//! Only the coordinator mutates registries.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use poolproto::{ActivationId, SessionKey, StreamPayload};

/// A session assigned to a worker.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub key: SessionKey,
    pub label: String,
    pub payload: StreamPayload,
    pub activation: ActivationId,
    /// Filled in when the worker reports `active`
    pub correlation: Option<String>,
    /// When the first stop was forwarded for this activation
    pub stop_requested_at: Option<Instant>,
}

impl SessionRecord {
    pub fn new(
        key: SessionKey,
        label: String,
        payload: StreamPayload,
        activation: ActivationId,
    ) -> Self {
        Self {
            key,
            label,
            payload,
            activation,
            correlation: None,
            stop_requested_at: None,
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stop_requested_at.is_some()
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionKey, SessionRecord>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load of the owning worker.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn get(&self, key: &SessionKey) -> Option<&SessionRecord> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &SessionKey) -> Option<&mut SessionRecord> {
        self.sessions.get_mut(key)
    }

    /// Insert a record. Returns false, leaving the registry untouched, if the
    /// key is already present.
    pub fn insert(&mut self, record: SessionRecord) -> bool {
        if self.sessions.contains_key(&record.key) {
            return false;
        }
        self.sessions.insert(record.key.clone(), record);
        true
    }

    pub fn remove(&mut self, key: &SessionKey) -> Option<SessionRecord> {
        self.sessions.remove(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &SessionRecord> {
        self.sessions.values()
    }

    /// Keys whose stop has been outstanding for at least `timeout` as of `now`.
    pub fn stops_outstanding(&self, now: Instant, timeout: Duration) -> Vec<SessionKey> {
        self.sessions
            .values()
            .filter(|r| {
                r.stop_requested_at
                    .is_some_and(|at| now.saturating_duration_since(at) >= timeout)
            })
            .map(|r| r.key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, activation: u64) -> SessionRecord {
        SessionRecord::new(
            SessionKey::from(key),
            format!("{key} label"),
            StreamPayload::default(),
            ActivationId(activation),
        )
    }

    #[test]
    fn test_insert_and_remove() {
        let mut registry = SessionRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.insert(record("a", 1)));
        assert!(registry.insert(record("b", 2)));
        assert_eq!(registry.len(), 2);

        let removed = registry.remove(&SessionKey::from("a")).unwrap();
        assert_eq!(removed.activation, ActivationId(1));
        assert!(!registry.contains(&SessionKey::from("a")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_keeps_original() {
        let mut registry = SessionRegistry::new();
        assert!(registry.insert(record("a", 1)));
        assert!(!registry.insert(record("a", 2)));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(&SessionKey::from("a")).unwrap().activation,
            ActivationId(1)
        );
    }

    #[test]
    fn test_stops_outstanding() {
        let now = Instant::now();
        let mut registry = SessionRegistry::new();

        let mut old = record("old", 1);
        old.stop_requested_at = Some(now);
        let mut fresh = record("fresh", 2);
        fresh.stop_requested_at = Some(now + Duration::from_secs(10));
        registry.insert(old);
        registry.insert(fresh);
        registry.insert(record("running", 3));

        let expired =
            registry.stops_outstanding(now + Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(expired, vec![SessionKey::from("old")]);
    }

    #[test]
    fn test_stops_outstanding_with_timeout_longer_than_clock_age() {
        let now = Instant::now();
        let timeout = Duration::from_secs(200 * 365 * 24 * 3600);
        let mut registry = SessionRegistry::new();

        let mut stopping = record("stopping", 1);
        stopping.stop_requested_at = Some(now);
        registry.insert(stopping);

        assert!(registry.stops_outstanding(now, timeout).is_empty());
        assert_eq!(
            registry.stops_outstanding(now + timeout, timeout),
            vec![SessionKey::from("stopping")]
        );
    }
}
