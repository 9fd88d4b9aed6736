use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::notify::Notifier;
use crate::screen::ScreenStore;
use crate::session::Verifier;

use super::validator::WalletValidator;

pub const PUSH_TITLE: &str = "New wallet added";
pub const PUSH_BODY: &str = "click here to accept";

/// What happened to the notification after the wallet was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationDispatch {
    /// Send handed to a background task; its result is only logged.
    Spawned,
    /// The screen has no push token.
    NoPushToken,
    /// Reading the push token failed; the link still stands.
    LookupFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutcome {
    pub screen_id: String,
    pub wallet_address: String,
    pub notification: NotificationDispatch,
}

pub struct WalletLinker {
    verifier: Arc<Verifier>,
    screens: Arc<dyn ScreenStore>,
    validator: Arc<dyn WalletValidator>,
    notifier: Arc<dyn Notifier>,
}

fn required<'a>(value: &'a str, message: &str) -> ServiceResult<&'a str> {
    let v = value.trim();
    if v.is_empty() { Err(ServiceError::InvalidRequest(message.to_string())) } else { Ok(v) }
}

impl WalletLinker {
    pub fn new(
        verifier: Arc<Verifier>,
        screens: Arc<dyn ScreenStore>,
        validator: Arc<dyn WalletValidator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { verifier, screens, validator, notifier }
    }

    /// Attach `wallet_address` to the screen if `credential` is its live credential.
    ///
    /// Order matters: nothing reaches the oracle or the store unless the credential
    /// verified. The wallet write is not rolled back if notification fails.
    pub async fn link_wallet(&self, screen_id: &str, credential: &str, wallet_address: &str) -> ServiceResult<LinkOutcome> {
        let screen_id = required(screen_id, "Invalid screen ID")?;
        let wallet_address = required(wallet_address, "Invalid wallet address")?;
        let credential = required(credential, "Invalid session code")?;

        self.verifier.verify(screen_id, credential)?.into_result()?;

        match self.validator.is_valid(wallet_address).await {
            Ok(true) => {}
            Ok(false) => {
                info!(target: "wallet", screen_id = %screen_id, "wallet rejected by oracle");
                debug!(target: "wallet", screen_id = %screen_id, wallet = %wallet_address, "rejected address");
                return Err(ServiceError::InvalidWallet(wallet_address.to_string()));
            }
            Err(e) => {
                error!(target: "wallet", screen_id = %screen_id, "wallet oracle unavailable: {:#}", e);
                return Err(ServiceError::StoreUnavailable("wallet oracle unavailable".into()));
            }
        }

        if !self.screens.set_wallet(screen_id, wallet_address)? {
            return Err(ServiceError::ScreenNotFound(screen_id.to_string()));
        }
        info!(target: "wallet", screen_id = %screen_id, "wallet linked");
        debug!(target: "wallet", screen_id = %screen_id, wallet = %wallet_address, "linked address");

        let notification = self.dispatch_notification(screen_id, wallet_address);
        Ok(LinkOutcome { screen_id: screen_id.to_string(), wallet_address: wallet_address.to_string(), notification })
    }

    fn dispatch_notification(&self, screen_id: &str, wallet_address: &str) -> NotificationDispatch {
        let token = match self.screens.push_token(screen_id) {
            Ok(Some(t)) => t,
            Ok(None) => {
                warn!(target: "wallet", screen_id = %screen_id, "no push token; skipping notification");
                return NotificationDispatch::NoPushToken;
            }
            Err(e) => {
                warn!(target: "wallet", screen_id = %screen_id, "push token lookup failed: {}", e);
                return NotificationDispatch::LookupFailed;
            }
        };

        let mut data = Map::new();
        data.insert("wallet_address".into(), Value::String(wallet_address.to_string()));
        let notifier = self.notifier.clone();
        let screen_id = screen_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = notifier.send(&token, PUSH_TITLE, PUSH_BODY, &data).await {
                warn!(target: "wallet", screen_id = %screen_id, "push notification failed: {:#}", e);
            }
        });
        NotificationDispatch::Spawned
    }
}

#[cfg(test)]
#[path = "linker_tests.rs"]
mod linker_tests;
