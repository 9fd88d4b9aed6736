use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{RecordStore, StoreError, SESSIONS_TABLE};

/// The single session row of a screen. Keyed by `screen_id`; every issuance replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub screen_id: String,
    pub session_token: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
}

impl Session {
    /// Inclusive on both ends.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_to
    }
}

/// Session collaborator. `put` overwrites whatever row the screen had.
pub trait SessionStore: Send + Sync {
    fn get(&self, screen_id: &str) -> Result<Option<Session>, StoreError>;
    fn put(&self, session: &Session) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct RecordSessionStore {
    records: RecordStore,
}

impl RecordSessionStore {
    pub fn new(records: RecordStore) -> Self { Self { records } }
}

impl SessionStore for RecordSessionStore {
    fn get(&self, screen_id: &str) -> Result<Option<Session>, StoreError> { self.records.get(SESSIONS_TABLE, screen_id) }

    fn put(&self, session: &Session) -> Result<(), StoreError> { self.records.put(SESSIONS_TABLE, &session.screen_id, session) }
}
