//!
//! daiara HTTP server
//! ------------------
//! Axum front end over the screen, session, wallet and artwork services.
//!
//! Routes:
//! - `GET  /`          health check.
//! - `POST /screens`   register a screen (operator token).
//! - `GET  /sessions`  issue a session credential for `?screen_id=` (operator token).
//! - `POST /wallet`    link a wallet using the screen's session credential.
//! - `POST /artworks`  multipart artwork upload (operator token plus screen credential).
//!
//! Handlers hold no state of their own; everything lives behind `AppState`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::artwork::{Artwork, ArtworkMetadata, ArtworkService};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::credential::{constant_time_eq, CredentialCodec};
use crate::error::{AppError, AppResult, ServiceError};
use crate::notify::{ExpoPushNotifier, LogNotifier, Notifier};
use crate::screen::{RecordScreenStore, Screen, ScreenRegistry};
use crate::session::{RecordSessionStore, SessionManager, Verifier};
use crate::storage::{objects_dir, records_dir, FsObjectStore, ObjectStore, RecordStore};
use crate::wallet::{FormatWalletValidator, OracleWalletValidator, WalletLinker, WalletValidator};

pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// External pieces the services are wired onto. Tests swap in in-memory stores,
/// a manual clock and fake oracles.
pub struct Collaborators {
    pub records: RecordStore,
    pub objects: Arc<dyn ObjectStore>,
    pub clock: Arc<dyn Clock>,
    pub validator: Arc<dyn WalletValidator>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Disk-backed stores under `dataDir`, the configured oracle and push endpoint
    /// (or their offline fallbacks).
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let records = RecordStore::open(records_dir(&config.data_dir))
            .with_context(|| format!("opening record store under {:?}", config.data_dir))?;
        let objects = FsObjectStore::new(objects_dir(&config.data_dir))
            .with_context(|| format!("opening object store under {:?}", config.data_dir))?;
        let validator: Arc<dyn WalletValidator> = match &config.wallet_oracle_url {
            Some(url) => Arc::new(OracleWalletValidator::new(url.clone())?),
            None => {
                warn!(target: "startup", "no walletOracleUrl configured; wallet addresses are checked by format only");
                Arc::new(FormatWalletValidator)
            }
        };
        let notifier: Arc<dyn Notifier> = match config.push_target() {
            Some(url) => Arc::new(ExpoPushNotifier::new(url)?),
            None => {
                info!(target: "startup", "push delivery switched off; notifications go to the log");
                Arc::new(LogNotifier)
            }
        };
        Ok(Self { records, objects: Arc::new(objects), clock: Arc::new(SystemClock), validator, notifier })
    }
}

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub records: RecordStore,
    pub screens: Arc<ScreenRegistry>,
    pub sessions: Arc<SessionManager>,
    pub wallets: Arc<WalletLinker>,
    pub artworks: Arc<ArtworkService>,
}

impl AppState {
    pub fn new(config: Config, parts: Collaborators) -> anyhow::Result<Self> {
        config.validate()?;
        let codec = Arc::new(CredentialCodec::new(config.signing_key.as_bytes()).context("signing key")?);
        let screen_store = Arc::new(RecordScreenStore::new(parts.records.clone()));
        let session_store = Arc::new(RecordSessionStore::new(parts.records.clone()));
        let verifier = Arc::new(Verifier::new(session_store.clone(), codec.clone(), parts.clock.clone()));

        let screens = Arc::new(ScreenRegistry::new(screen_store.clone(), parts.clock.clone()));
        let sessions = Arc::new(SessionManager::new(
            screen_store.clone(),
            session_store,
            codec,
            parts.clock.clone(),
            config.session_window_duration(),
        ));
        let wallets = Arc::new(WalletLinker::new(verifier.clone(), screen_store, parts.validator, parts.notifier));
        let artworks = Arc::new(ArtworkService::new(verifier, parts.objects, parts.records.clone(), parts.clock));
        Ok(Self { config: Arc::new(config), records: parts.records, screens, sessions, wallets, artworks })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "daiara ok" }))
        .route("/screens", post(register_screen))
        .route("/sessions", get(start_session))
        .route("/wallet", post(link_wallet))
        .route("/artworks", post(add_artwork).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then write a final snapshot of the record store.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let snapshots = state.config.snapshot_interval().and_then(|every| state.records.spawn_snapshot_loop(every));
    let addr = listener.local_addr()?;
    info!(target: "startup", %addr, "daiara listening");

    axum::serve(listener, router(state.clone())).with_graceful_shutdown(shutdown).await?;

    if let Some(task) = snapshots {
        task.abort();
    }
    state.records.save_snapshot().context("writing final record snapshot")?;
    info!(target: "startup", "daiara stopped");
    Ok(())
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "daiara starting: http_port={}, data_dir={:?}, session_window={}s, oracle={}, push={}",
        config.http_port,
        config.data_dir,
        config.session_window,
        config.wallet_oracle_url.is_some(),
        config.push_target().unwrap_or("off")
    );
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create or access data dir: {:?}", config.data_dir))?;

    let parts = Collaborators::from_config(&config)?;
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let state = AppState::new(config, parts)?;
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    serve(listener, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(target: "startup", "cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!(target: "startup", "shutdown requested");
}

/// `Authorization: [Bearer ]<token>` against the shared operator token.
fn is_authorized(headers: &HeaderMap, expected: &str) -> bool {
    let Some(raw) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else { return false };
    let raw = raw.trim();
    let presented = raw.strip_prefix("Bearer ").map(str::trim).unwrap_or(raw);
    !presented.is_empty() && constant_time_eq(presented, expected)
}

fn require_operator(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    if is_authorized(headers, &state.config.shared_auth_token) {
        Ok(())
    } else {
        warn!(target: "http", "request with wrong authorization token");
        Err(AppError::forbidden("forbidden", "Wrong authorization token provided"))
    }
}

fn bad_request() -> AppError { AppError::user("invalid_request", "Invalid request") }

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

#[derive(Debug, Default, Deserialize)]
struct RegisterScreenPayload {
    #[serde(default)]
    push_notification_token: Option<String>,
}

async fn register_screen(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> AppResult<(StatusCode, Json<Screen>)> {
    require_operator(&state, &headers)?;
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        RegisterScreenPayload::default()
    } else {
        serde_json::from_slice::<RegisterScreenPayload>(&body).map_err(|_| bad_request())?
    };
    let screen = state.screens.register(payload.push_notification_token).map_err(ServiceError::from)?;
    Ok((StatusCode::OK, Json(screen)))
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    #[serde(default)]
    screen_id: Option<String>,
}

async fn start_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<SessionQuery>,
) -> AppResult<(StatusCode, Json<Value>)> {
    require_operator(&state, &headers)?;
    let credential = state.sessions.issue(q.screen_id.as_deref().unwrap_or(""))?;
    Ok((StatusCode::CREATED, Json(json!({ "session_token": credential }))))
}

#[derive(Debug, Deserialize)]
struct LinkWalletPayload {
    #[serde(default)]
    screen_id: String,
    #[serde(default)]
    session_token: String,
    #[serde(default)]
    wallet_address: String,
}

async fn link_wallet(State(state): State<AppState>, body: Bytes) -> AppResult<(StatusCode, Json<Value>)> {
    let p: LinkWalletPayload = serde_json::from_slice(&body).map_err(|_| bad_request())?;
    let outcome = state.wallets.link_wallet(&p.screen_id, &p.session_token, &p.wallet_address).await?;
    tracing::debug!(target: "http", screen_id = %outcome.screen_id, notification = ?outcome.notification, "wallet link handled");
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))))
}

async fn add_artwork(State(state): State<AppState>, headers: HeaderMap, mut multipart: Multipart) -> AppResult<(StatusCode, Json<Artwork>)> {
    require_operator(&state, &headers)?;
    let screen_id = header_str(&headers, "screen-id").to_string();
    let credential = header_str(&headers, "screen-session-token").to_string();

    let mut file: Option<(String, Bytes)> = None;
    let mut metadata = ArtworkMetadata::default();
    while let Some(field) = multipart.next_field().await.map_err(|_| bad_request())? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(|_| bad_request())?;
                file = Some((file_name, bytes));
            }
            "metadata" => {
                let bytes = field.bytes().await.map_err(|_| bad_request())?;
                metadata = serde_json::from_slice(&bytes).map_err(|_| AppError::user("invalid_request", "Invalid metadata"))?;
            }
            _ => {}
        }
    }
    let Some((file_name, bytes)) = file else {
        return Err(AppError::user("invalid_request", "Missing file"));
    };

    let artwork = state.artworks.add_artwork(&screen_id, &credential, &file_name, &bytes, metadata).map_err(|e| match e {
        ServiceError::Unauthorized(_) => AppError::auth("unauthorized", "Wrong session token provided"),
        other => AppError::from(other),
    })?;
    Ok((StatusCode::CREATED, Json(artwork)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn operator_token_with_or_without_bearer() {
        assert!(is_authorized(&headers("Bearer op-token"), "op-token"));
        assert!(is_authorized(&headers("op-token"), "op-token"));
        assert!(is_authorized(&headers("  Bearer   op-token "), "op-token"));
        assert!(!is_authorized(&headers("Bearer other"), "op-token"));
        assert!(!is_authorized(&headers("Bearer "), "op-token"));
        assert!(!is_authorized(&HeaderMap::new(), "op-token"));
    }
}
