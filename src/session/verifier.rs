use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::credential::{constant_time_eq, CredentialCodec};
use crate::error::{ServiceError, ServiceResult};

use super::record::SessionStore;

/// Why a presented credential was not accepted. Logged server-side; clients see one
/// uniform denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("no active session")]
    NoActiveSession,
    #[error("session expired")]
    SessionExpired,
    #[error("malformed credential")]
    Malformed,
    #[error("credential mismatch")]
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Accepted,
    Rejected(Rejection),
}

impl Verification {
    pub fn is_accepted(&self) -> bool { matches!(self, Verification::Accepted) }

    /// `Rejected` becomes `ServiceError::Unauthorized`.
    pub fn into_result(self) -> ServiceResult<()> {
        match self {
            Verification::Accepted => Ok(()),
            Verification::Rejected(r) => Err(ServiceError::Unauthorized(r)),
        }
    }
}

/// Checks a presented credential against the live session of a screen.
pub struct Verifier {
    sessions: Arc<dyn SessionStore>,
    codec: Arc<CredentialCodec>,
    clock: Arc<dyn Clock>,
}

impl Verifier {
    pub fn new(sessions: Arc<dyn SessionStore>, codec: Arc<CredentialCodec>, clock: Arc<dyn Clock>) -> Self {
        Self { sessions, codec, clock }
    }

    /// The stored session is the source of truth: the expected credential is
    /// re-encoded from the stored secret and window end, then string-compared with
    /// the presented one. Decoding the presented value only screens out malformed input.
    ///
    /// Store failures are errors; everything else is a `Verification`.
    pub fn verify(&self, screen_id: &str, presented: &str) -> ServiceResult<Verification> {
        let verdict = self.check(screen_id, presented)?;
        if let Verification::Rejected(reason) = verdict {
            warn!(target: "session", screen_id = %screen_id, reason = %reason, "credential rejected");
        }
        Ok(verdict)
    }

    fn check(&self, screen_id: &str, presented: &str) -> ServiceResult<Verification> {
        let Some(session) = self.sessions.get(screen_id)? else {
            return Ok(Verification::Rejected(Rejection::NoActiveSession));
        };
        let now = self.clock.now();
        if !session.is_live_at(now) {
            debug!(target: "session", screen_id = %screen_id, valid_from = %session.valid_from, valid_to = %session.valid_to, now = %now, "outside session window");
            return Ok(Verification::Rejected(Rejection::SessionExpired));
        }
        if let Err(e) = self.codec.decode(presented) {
            debug!(target: "session", screen_id = %screen_id, "presented credential does not decode: {}", e);
            return Ok(Verification::Rejected(Rejection::Malformed));
        }
        let expected = self.codec.encode_until(&session.screen_id, &session.session_token, session.valid_to);
        if constant_time_eq(&expected, presented) {
            Ok(Verification::Accepted)
        } else {
            Ok(Verification::Rejected(Rejection::Mismatch))
        }
    }
}
