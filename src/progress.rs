//! Per-request migration progress, shared between upload workers and the
//! `/progress/:id` endpoint.
//!
//! The store is bounded: finished entries expire after a TTL and running ones
//! after a longer one. When the store is full the least recently updated entry
//! is evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::migrate::ProgressSink;

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_TTL_SECS: i64 = 3600;
pub const DEFAULT_RUNNING_TTL_SECS: i64 = 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressState {
    Running,
    Completed,
    Failed,
}

impl ProgressState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressState::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub percent: u8,
    pub message: String,
    pub state: ProgressState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ProgressStore {
    entries: Mutex<HashMap<String, ProgressEntry>>,
    capacity: usize,
    ttl: Duration,
    running_ttl: Duration,
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, Duration::seconds(DEFAULT_TTL_SECS))
    }
}

impl ProgressStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
            running_ttl: Duration::seconds(DEFAULT_RUNNING_TTL_SECS).max(ttl),
        }
    }

    /// How long an entry may sit in `Running` without an update before it is dropped
    pub fn with_running_ttl(mut self, running_ttl: Duration) -> Self {
        self.running_ttl = running_ttl;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ProgressEntry>> {
        // a panic elsewhere never leaves an entry half-written
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start tracking `id` at 0%
    pub fn begin(&self, id: &str) {
        self.set(id, 0, "Queued", ProgressState::Running, Utc::now());
    }

    pub fn update(&self, id: &str, percent: u8, message: &str) {
        self.set(id, percent.min(100), message, ProgressState::Running, Utc::now());
    }

    pub fn complete(&self, id: &str, message: &str) {
        self.set(id, 100, message, ProgressState::Completed, Utc::now());
    }

    pub fn fail(&self, id: &str, message: &str) {
        self.set(id, 100, message, ProgressState::Failed, Utc::now());
    }

    /// Current entry for `id`, unless unknown or expired
    pub fn get(&self, id: &str) -> Option<ProgressEntry> {
        self.get_at(id, Utc::now())
    }

    pub fn get_at(&self, id: &str, now: DateTime<Utc>) -> Option<ProgressEntry> {
        self.lock()
            .get(id)
            .filter(|entry| !self.is_expired(entry, now))
            .cloned()
    }

    pub fn remove(&self, id: &str) -> Option<ProgressEntry> {
        self.lock().remove(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop entries past their TTL. Returns how many went.
    pub fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before - entries.len()
    }

    /// A [`ProgressSink`] writing into this store under `id`
    pub fn handle(self: &Arc<Self>, id: impl Into<String>) -> RequestProgress {
        RequestProgress {
            store: Arc::clone(self),
            id: id.into(),
        }
    }

    pub(crate) fn set(
        &self,
        id: &str,
        percent: u8,
        message: &str,
        state: ProgressState,
        now: DateTime<Utc>,
    ) {
        let mut entries = self.lock();
        if !entries.contains_key(id) && entries.len() >= self.capacity {
            entries.retain(|_, entry| !self.is_expired(entry, now));
            while entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.updated_at)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => {
                        entries.remove(&key);
                    }
                    None => break,
                }
            }
        }
        entries.insert(
            id.to_string(),
            ProgressEntry {
                percent,
                message: message.to_string(),
                state,
                updated_at: now,
            },
        );
    }

    fn is_expired(&self, entry: &ProgressEntry, now: DateTime<Utc>) -> bool {
        let ttl = if entry.state.is_terminal() {
            self.ttl
        } else {
            self.running_ttl
        };
        now - entry.updated_at > ttl
    }
}

/// Progress reporting for one request
#[derive(Debug, Clone)]
pub struct RequestProgress {
    store: Arc<ProgressStore>,
    id: String,
}

impl RequestProgress {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn complete(&self, message: &str) {
        self.store.complete(&self.id, message);
    }

    pub fn fail(&self, message: &str) {
        self.store.fail(&self.id, message);
    }
}

impl ProgressSink for RequestProgress {
    fn report(&self, percent: u8, message: &str) {
        self.store.update(&self.id, percent, message);
    }
}
