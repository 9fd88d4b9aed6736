//! Session lifecycle tests through the public service API: issuance, verification,
//! wallet linking and persistence of the record store across restarts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use serde_json::{Map, Value};
use tempfile::tempdir;
use tokio::sync::mpsc;

use daiara::clock::ManualClock;
use daiara::credential::CredentialCodec;
use daiara::error::ServiceError;
use daiara::notify::Notifier;
use daiara::screen::{RecordScreenStore, ScreenRegistry, ScreenStore};
use daiara::session::{Rejection, RecordSessionStore, SessionManager, Verification, Verifier};
use daiara::storage::RecordStore;
use daiara::wallet::{WalletLinker, WalletValidator};

struct ScriptedValidator {
    accept: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl WalletValidator for ScriptedValidator {
    async fn is_valid(&self, _address: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.accept)
    }
}

struct ChannelNotifier(mpsc::UnboundedSender<(String, Map<String, Value>)>);

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send(&self, token: &str, _title: &str, _body: &str, data: &Map<String, Value>) -> Result<()> {
        let _ = self.0.send((token.to_string(), data.clone()));
        Ok(())
    }
}

struct World {
    registry: ScreenRegistry,
    screens: Arc<RecordScreenStore>,
    manager: SessionManager,
    verifier: Arc<Verifier>,
    linker: WalletLinker,
    validator: Arc<ScriptedValidator>,
    clock: Arc<ManualClock>,
    pushes: mpsc::UnboundedReceiver<(String, Map<String, Value>)>,
}

fn world(records: RecordStore, accept: bool) -> World {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 5, 8, 0, 0).unwrap()));
    let codec = Arc::new(CredentialCodec::new("integration-signing-key").unwrap());
    let screens = Arc::new(RecordScreenStore::new(records.clone()));
    let sessions = Arc::new(RecordSessionStore::new(records));
    let registry = ScreenRegistry::new(screens.clone(), clock.clone());
    let manager = SessionManager::new(screens.clone(), sessions.clone(), codec.clone(), clock.clone(), Duration::minutes(5));
    let verifier = Arc::new(Verifier::new(sessions, codec, clock.clone()));
    let validator = Arc::new(ScriptedValidator { accept, calls: AtomicUsize::new(0) });
    let (tx, pushes) = mpsc::unbounded_channel();
    let linker = WalletLinker::new(verifier.clone(), screens.clone(), validator.clone(), Arc::new(ChannelNotifier(tx)));
    World { registry, screens, manager, verifier, linker, validator, clock, pushes }
}

fn flip_signature_bit(cred: &str) -> String {
    let at = cred.rfind('.').unwrap() + 1;
    let mut chars: Vec<char> = cred.chars().collect();
    chars[at] = if chars[at] == 'A' { 'B' } else { 'A' };
    chars.into_iter().collect()
}

#[tokio::test]
async fn end_to_end_register_issue_link() -> Result<()> {
    let mut w = world(RecordStore::in_memory(), true);
    let s1 = w.registry.register(Some("ExponentPushToken[S1]".into()))?;
    let c1 = w.manager.issue(&s1.id)?;
    assert_eq!(w.verifier.verify(&s1.id, &c1)?, Verification::Accepted);

    w.linker.link_wallet(&s1.id, &c1, "0xABC0000000000000000000000000000000000001").await?;
    let stored = w.screens.get(&s1.id)?.unwrap();
    assert_eq!(stored.wallet_address.as_deref(), Some("0xABC0000000000000000000000000000000000001"));

    let (token, data) = w.pushes.recv().await.unwrap();
    assert_eq!(token, "ExponentPushToken[S1]");
    assert_eq!(data["wallet_address"], "0xABC0000000000000000000000000000000000001");
    Ok(())
}

#[tokio::test]
async fn second_issue_invalidates_first_credential() -> Result<()> {
    let w = world(RecordStore::in_memory(), true);
    let s = w.registry.register(None)?;
    let first = w.manager.issue(&s.id)?;
    let second = w.manager.issue(&s.id)?;
    assert!(CredentialCodec::new("integration-signing-key")?.decode(&first).is_ok());
    assert_eq!(w.verifier.verify(&s.id, &first)?, Verification::Rejected(Rejection::Mismatch));
    assert!(w.verifier.verify(&s.id, &second)?.is_accepted());
    Ok(())
}

#[tokio::test]
async fn expiry_boundary_is_inclusive() -> Result<()> {
    let w = world(RecordStore::in_memory(), true);
    let s = w.registry.register(None)?;
    let cred = w.manager.issue(&s.id)?;
    w.clock.advance(Duration::minutes(5));
    assert!(w.verifier.verify(&s.id, &cred)?.is_accepted());
    w.clock.advance(Duration::milliseconds(1));
    assert_eq!(w.verifier.verify(&s.id, &cred)?, Verification::Rejected(Rejection::SessionExpired));
    Ok(())
}

#[tokio::test]
async fn sessionless_screen_is_not_expired() -> Result<()> {
    let w = world(RecordStore::in_memory(), true);
    let s = w.registry.register(None)?;
    assert_eq!(w.verifier.verify(&s.id, "a.b.c")?, Verification::Rejected(Rejection::NoActiveSession));
    assert_eq!(w.verifier.verify("unregistered", "a.b.c")?, Verification::Rejected(Rejection::NoActiveSession));
    Ok(())
}

#[tokio::test]
async fn rejected_wallet_leaves_screen_untouched() -> Result<()> {
    let w = world(RecordStore::in_memory(), false);
    let s = w.registry.register(None)?;
    let cred = w.manager.issue(&s.id)?;
    let err = w.linker.link_wallet(&s.id, &cred, "0xnope").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidWallet(_)));
    assert_eq!(w.screens.get(&s.id)?.unwrap().wallet_address, None);
    Ok(())
}

#[tokio::test]
async fn tampered_signature_stops_before_validator() -> Result<()> {
    let w = world(RecordStore::in_memory(), true);
    let s = w.registry.register(None)?;
    let cred = w.manager.issue(&s.id)?;
    let err = w.linker.link_wallet(&s.id, &flip_signature_bit(&cred), "0xabc").await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));
    assert_eq!(w.validator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(w.screens.get(&s.id)?.unwrap().wallet_address, None);
    Ok(())
}

#[tokio::test]
async fn sessions_survive_a_restart() -> Result<()> {
    let dir = tempdir()?;
    let (screen_id, cred) = {
        let records = RecordStore::open(dir.path())?;
        let w = world(records.clone(), true);
        let s = w.registry.register(None)?;
        let cred = w.manager.issue(&s.id)?;
        records.save_snapshot()?;
        (s.id, cred)
    };

    let reopened = world(RecordStore::open(dir.path())?, true);
    assert!(reopened.screens.exists(&screen_id)?);
    assert!(reopened.verifier.verify(&screen_id, &cred)?.is_accepted());
    Ok(())
}
