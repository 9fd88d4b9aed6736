//!
//! daiara configuration
//! --------------------
//! Loaded once at process start and shared read-only afterwards. Sources, lowest to
//! highest precedence: JSON file (`--config PATH` or `DAIARA_CONFIG`), `DAIARA_*`
//! environment variables, then the `--http-port` / `--data-dir` flags.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::notify::DEFAULT_PUSH_ENDPOINT;
use crate::session::DEFAULT_SESSION_WINDOW_SECS;

pub const DEFAULT_HTTP_PORT: u16 = 7878;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 5000;
/// Upper bound for `sessionWindow`: one day.
pub const MAX_SESSION_WINDOW_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path:?}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("cannot parse config file {path:?}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0}")]
    Invalid(String),
}

fn default_session_window() -> u64 { DEFAULT_SESSION_WINDOW_SECS }
fn default_http_port() -> u16 { DEFAULT_HTTP_PORT }
fn default_data_dir() -> PathBuf { PathBuf::from(DEFAULT_DATA_DIR) }
fn default_snapshot_interval() -> u64 { DEFAULT_SNAPSHOT_INTERVAL_MS }
fn default_push_endpoint() -> Option<String> { Some(DEFAULT_PUSH_ENDPOINT.to_string()) }

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub signing_key: String,
    #[serde(default)]
    pub shared_auth_token: String,
    /// Seconds.
    #[serde(default = "default_session_window")]
    pub session_window: u64,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub wallet_oracle_url: Option<String>,
    /// Defaults to the Expo push service. Empty or `off` keeps notifications in the log.
    #[serde(default = "default_push_endpoint")]
    pub push_endpoint: Option<String>,
    /// 0 disables periodic snapshots; one is still written on shutdown.
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_ms: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("signing_key", &"<redacted>")
            .field("shared_auth_token", &"<redacted>")
            .field("session_window", &self.session_window)
            .field("http_port", &self.http_port)
            .field("data_dir", &self.data_dir)
            .field("wallet_oracle_url", &self.wallet_oracle_url)
            .field("push_endpoint", &self.push_endpoint)
            .field("snapshot_interval_ms", &self.snapshot_interval_ms)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signing_key: String::new(),
            shared_auth_token: String::new(),
            session_window: default_session_window(),
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            wallet_oracle_url: None,
            push_endpoint: default_push_endpoint(),
            snapshot_interval_ms: default_snapshot_interval(),
        }
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value: raw.to_string() })
}

fn non_empty(v: String) -> Option<String> {
    let t = v.trim();
    if t.is_empty() { None } else { Some(t.to_string()) }
}

impl Config {
    /// Defaults plus the two required secrets. Mostly for tests and embedding.
    pub fn new(signing_key: impl Into<String>, shared_auth_token: impl Into<String>) -> Self {
        Self { signing_key: signing_key.into(), shared_auth_token: shared_auth_token.into(), ..Self::default() }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Process configuration from the real argv and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::resolve(&args, |k| std::env::var(k).ok())
    }

    /// Layer file, environment and flags, then validate.
    pub fn resolve(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let file = arg_value(args, "--config").map(PathBuf::from).or_else(|| env("DAIARA_CONFIG").and_then(non_empty).map(PathBuf::from));
        let mut cfg = match file {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };

        if let Some(v) = env("DAIARA_SIGNING_KEY") { cfg.signing_key = v; }
        if let Some(v) = env("DAIARA_SHARED_AUTH_TOKEN") { cfg.shared_auth_token = v; }
        if let Some(v) = env("DAIARA_SESSION_WINDOW") { cfg.session_window = parse_value("DAIARA_SESSION_WINDOW", &v)?; }
        if let Some(v) = env("DAIARA_HTTP_PORT") { cfg.http_port = parse_value("DAIARA_HTTP_PORT", &v)?; }
        if let Some(v) = env("DAIARA_DATA_DIR").and_then(non_empty) { cfg.data_dir = PathBuf::from(v); }
        if let Some(v) = env("DAIARA_WALLET_ORACLE_URL") { cfg.wallet_oracle_url = non_empty(v); }
        if let Some(v) = env("DAIARA_PUSH_ENDPOINT") { cfg.push_endpoint = Some(v); }
        if let Some(v) = env("DAIARA_SNAPSHOT_INTERVAL_MS") { cfg.snapshot_interval_ms = parse_value("DAIARA_SNAPSHOT_INTERVAL_MS", &v)?; }

        if let Some(v) = arg_value(args, "--http-port") { cfg.http_port = parse_value("--http-port", v)?; }
        if let Some(v) = arg_value(args, "--data-dir") { cfg.data_dir = PathBuf::from(v); }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_key.trim().is_empty() {
            return Err(ConfigError::Missing("signingKey"));
        }
        if self.shared_auth_token.trim().is_empty() {
            return Err(ConfigError::Missing("sharedAuthToken"));
        }
        if self.session_window == 0 {
            return Err(ConfigError::Invalid("sessionWindow must be greater than zero".into()));
        }
        if self.session_window > MAX_SESSION_WINDOW_SECS {
            return Err(ConfigError::Invalid(format!("sessionWindow must not exceed {} seconds", MAX_SESSION_WINDOW_SECS)));
        }
        Ok(())
    }

    pub fn session_window_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_window as i64)
    }

    /// Push endpoint to deliver to, or `None` when delivery is switched off.
    pub fn push_target(&self) -> Option<&str> {
        match self.push_endpoint.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(v) if v.eq_ignore_ascii_case("off") => None,
            Some(v) => Some(v),
        }
    }

    pub fn snapshot_interval(&self) -> Option<std::time::Duration> {
        if self.snapshot_interval_ms == 0 { None } else { Some(std::time::Duration::from_millis(self.snapshot_interval_ms)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    fn args(list: &[&str]) -> Vec<String> { list.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn defaults_apply_when_only_secrets_given() {
        let cfg = Config::resolve(&args(&["daiara"]), env_of(&[("DAIARA_SIGNING_KEY", "k"), ("DAIARA_SHARED_AUTH_TOKEN", "t")])).unwrap();
        assert_eq!(cfg.session_window, 300);
        assert_eq!(cfg.http_port, 7878);
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.snapshot_interval(), Some(std::time::Duration::from_millis(5000)));
        assert_eq!(cfg.session_window_duration(), chrono::Duration::minutes(5));
        assert_eq!(cfg.push_target(), Some(DEFAULT_PUSH_ENDPOINT));
    }

    #[test]
    fn push_delivery_can_be_switched_off() {
        let secrets = [("DAIARA_SIGNING_KEY", "k"), ("DAIARA_SHARED_AUTH_TOKEN", "t")];
        for off in ["", "off", " OFF "] {
            let mut pairs = secrets.to_vec();
            pairs.push(("DAIARA_PUSH_ENDPOINT", off));
            let cfg = Config::resolve(&args(&[]), env_of(&pairs)).unwrap();
            assert_eq!(cfg.push_target(), None, "value {:?}", off);
        }
        let mut pairs = secrets.to_vec();
        pairs.push(("DAIARA_PUSH_ENDPOINT", "https://push.example/send"));
        let cfg = Config::resolve(&args(&[]), env_of(&pairs)).unwrap();
        assert_eq!(cfg.push_target(), Some("https://push.example/send"));

        let from_file: Config = serde_json::from_str(r#"{"signingKey":"k","sharedAuthToken":"t","pushEndpoint":null}"#).unwrap();
        assert_eq!(from_file.push_target(), None);
        let omitted: Config = serde_json::from_str(r#"{"signingKey":"k","sharedAuthToken":"t"}"#).unwrap();
        assert_eq!(omitted.push_target(), Some(DEFAULT_PUSH_ENDPOINT));
    }

    #[test]
    fn session_window_is_capped_at_one_day() {
        let mut cfg = Config::new("k", "t");
        cfg.session_window = MAX_SESSION_WINDOW_SECS;
        assert!(cfg.validate().is_ok());
        cfg.session_window = MAX_SESSION_WINDOW_SECS + 1;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        cfg.session_window = 10_000_000_000_000;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn file_then_env_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daiara.json");
        std::fs::write(
            &path,
            r#"{"signingKey":"file-key","sharedAuthToken":"file-token","sessionWindow":60,"httpPort":9000,"dataDir":"/srv/a","snapshotIntervalMs":0}"#,
        )
        .unwrap();
        let env = env_of(&[("DAIARA_CONFIG", path.to_str().unwrap()), ("DAIARA_HTTP_PORT", "9100"), ("DAIARA_SHARED_AUTH_TOKEN", "env-token")]);
        let cfg = Config::resolve(&args(&["daiara", "--data-dir", "/srv/b"]), env).unwrap();
        assert_eq!(cfg.signing_key, "file-key");
        assert_eq!(cfg.shared_auth_token, "env-token");
        assert_eq!(cfg.session_window, 60);
        assert_eq!(cfg.http_port, 9100);
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/b"));
        assert_eq!(cfg.snapshot_interval(), None);

        let cfg = Config::resolve(&args(&["daiara", "--config", path.to_str().unwrap(), "--http-port", "9200"]), env_of(&[])).unwrap();
        assert_eq!(cfg.http_port, 9200);
        assert_eq!(cfg.shared_auth_token, "file-token");
    }

    #[test]
    fn missing_secrets_fail_fast() {
        let err = Config::resolve(&args(&["daiara"]), env_of(&[("DAIARA_SHARED_AUTH_TOKEN", "t")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("signingKey")));
        let err = Config::resolve(&args(&["daiara"]), env_of(&[("DAIARA_SIGNING_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("sharedAuthToken")));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let base = [("DAIARA_SIGNING_KEY", "k"), ("DAIARA_SHARED_AUTH_TOKEN", "t")];
        let mut pairs = base.to_vec();
        pairs.push(("DAIARA_HTTP_PORT", "seventy"));
        assert!(matches!(Config::resolve(&args(&[]), env_of(&pairs)), Err(ConfigError::InvalidValue { .. })));
        let mut pairs = base.to_vec();
        pairs.push(("DAIARA_SESSION_WINDOW", "0"));
        assert!(matches!(Config::resolve(&args(&[]), env_of(&pairs)), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let err = Config::resolve(&args(&["daiara", "--config", "/definitely/not/here.json"]), env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn debug_redacts_secrets() {
        let s = format!("{:?}", Config::new("super-secret-key", "operator-token"));
        assert!(!s.contains("super-secret-key"));
        assert!(!s.contains("operator-token"));
    }
}
