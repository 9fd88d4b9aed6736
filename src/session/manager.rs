use std::sync::Arc;

use base64::Engine;
use chrono::Duration;
use tracing::info;

use crate::clock::Clock;
use crate::credential::CredentialCodec;
use crate::error::{ServiceError, ServiceResult};
use crate::screen::ScreenStore;
use crate::tprintln;

use super::record::{Session, SessionStore};

pub const DEFAULT_SESSION_WINDOW_SECS: u64 = 5 * 60;

fn gen_secret() -> ServiceResult<String> {
    // 256-bit random secret, base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| ServiceError::StoreUnavailable(format!("random source unavailable: {}", e)))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Issues sessions for registered screens.
pub struct SessionManager {
    screens: Arc<dyn ScreenStore>,
    sessions: Arc<dyn SessionStore>,
    codec: Arc<CredentialCodec>,
    clock: Arc<dyn Clock>,
    pub window: Duration,
}

impl SessionManager {
    pub fn new(
        screens: Arc<dyn ScreenStore>,
        sessions: Arc<dyn SessionStore>,
        codec: Arc<CredentialCodec>,
        clock: Arc<dyn Clock>,
        window: Duration,
    ) -> Self {
        Self { screens, sessions, codec, clock, window }
    }

    /// Mint a fresh secret for `screen_id`, replace its session row and return the credential.
    ///
    /// Any earlier credential for the screen stops verifying, live or not. Two
    /// concurrent calls for the same screen race and the last write wins.
    pub fn issue(&self, screen_id: &str) -> ServiceResult<String> {
        let screen_id = screen_id.trim();
        if screen_id.is_empty() {
            return Err(ServiceError::InvalidRequest("Invalid screen ID".into()));
        }
        if !self.screens.exists(screen_id)? {
            info!(target: "session", screen_id = %screen_id, "session requested for unregistered screen");
            return Err(ServiceError::ScreenNotFound(screen_id.to_string()));
        }

        let now = self.clock.now();
        let valid_to = now
            .checked_add_signed(self.window)
            .ok_or_else(|| ServiceError::StoreUnavailable(format!("session window of {}s is out of range", self.window.num_seconds())))?;
        let secret = gen_secret()?;
        let session = Session {
            screen_id: screen_id.to_string(),
            session_token: secret,
            valid_from: now,
            valid_to,
        };
        self.sessions.put(&session)?;

        info!(target: "session", screen_id = %screen_id, valid_to = %session.valid_to, "session issued");
        tprintln!("session.issue screen={} window_secs={}", screen_id, self.window.num_seconds());
        Ok(self.codec.encode_until(&session.screen_id, &session.session_token, session.valid_to))
    }
}
