//! Screen records: identity of a physical display device.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::Clock;
use crate::storage::{RecordStore, StoreError, SCREENS_TABLE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub id: String,
    pub registered_date: DateTime<Utc>,
    /// Single current wallet; every successful link overwrites it.
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub push_notification_token: Option<String>,
}

/// Screen collaborator used by the session manager and the wallet linker.
pub trait ScreenStore: Send + Sync {
    fn exists(&self, screen_id: &str) -> Result<bool, StoreError>;
    fn get(&self, screen_id: &str) -> Result<Option<Screen>, StoreError>;
    fn insert(&self, screen: &Screen) -> Result<(), StoreError>;
    /// Overwrite the wallet of an existing screen. Returns false if the screen is unknown.
    fn set_wallet(&self, screen_id: &str, address: &str) -> Result<bool, StoreError>;

    fn push_token(&self, screen_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get(screen_id)?.and_then(|s| s.push_notification_token).filter(|t| !t.trim().is_empty()))
    }
}

/// `ScreenStore` over the `screens` table of a `RecordStore`.
#[derive(Clone)]
pub struct RecordScreenStore {
    records: RecordStore,
}

impl RecordScreenStore {
    pub fn new(records: RecordStore) -> Self { Self { records } }
}

impl ScreenStore for RecordScreenStore {
    fn exists(&self, screen_id: &str) -> Result<bool, StoreError> { Ok(self.records.contains(SCREENS_TABLE, screen_id)) }

    fn get(&self, screen_id: &str) -> Result<Option<Screen>, StoreError> { self.records.get(SCREENS_TABLE, screen_id) }

    fn insert(&self, screen: &Screen) -> Result<(), StoreError> { self.records.put(SCREENS_TABLE, &screen.id, screen) }

    fn set_wallet(&self, screen_id: &str, address: &str) -> Result<bool, StoreError> {
        self.records.update::<Screen, _>(SCREENS_TABLE, screen_id, |s| s.wallet_address = Some(address.to_string()))
    }
}

/// Creates screens with fresh ids.
pub struct ScreenRegistry {
    screens: Arc<dyn ScreenStore>,
    clock: Arc<dyn Clock>,
}

impl ScreenRegistry {
    pub fn new(screens: Arc<dyn ScreenStore>, clock: Arc<dyn Clock>) -> Self { Self { screens, clock } }

    pub fn register(&self, push_notification_token: Option<String>) -> Result<Screen, StoreError> {
        let screen = Screen {
            id: uuid::Uuid::new_v4().to_string(),
            registered_date: self.clock.now(),
            wallet_address: None,
            push_notification_token: push_notification_token.filter(|t| !t.trim().is_empty()),
        };
        self.screens.insert(&screen)?;
        info!(target: "screen", screen_id = %screen.id, has_push_token = screen.push_notification_token.is_some(), "screen registered");
        Ok(screen)
    }
}
