//! Screen sessions: one authorization window per screen, handed to clients as a
//! signed credential and checked by recomputing that credential from the stored secret.
//! Keep the public surface thin and split implementation across sub-modules.

mod record;
mod manager;
mod verifier;

pub use record::{Session, SessionStore, RecordSessionStore};
pub use manager::{SessionManager, DEFAULT_SESSION_WINDOW_SECS};
pub use verifier::{Rejection, Verification, Verifier};
