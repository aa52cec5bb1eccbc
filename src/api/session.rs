//! Session storage for serialized transcripts

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Opaque per-session key-value store
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str) -> Option<String>;
    fn set(&self, session_id: &str, value: String);
}

struct Entry {
    value: String,
    touched: Instant,
}

/// Process-local store; entries idle longer than `idle_timeout` are dropped.
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<String, Entry>>,
    idle_timeout: Duration,
}

impl InMemorySessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn purge_expired(&self, entries: &mut HashMap<String, Entry>) {
        let before = entries.len();
        entries.retain(|_, e| e.touched.elapsed() <= self.idle_timeout);
        let expired = before - entries.len();
        if expired > 0 {
            tracing::debug!(expired, "Dropped idle chat sessions");
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, session_id: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.purge_expired(&mut entries);
        entries.get_mut(session_id).map(|entry| {
            entry.touched = Instant::now();
            entry.value.clone()
        })
    }

    fn set(&self, session_id: &str, value: String) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.purge_expired(&mut entries);
        entries.insert(
            session_id.to_string(),
            Entry {
                value,
                touched: Instant::now(),
            },
        );
    }
}

/// One async mutex per session so read-modify-write cycles on a session
/// run one at a time.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub fn lock_for(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Nobody else holds these
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
