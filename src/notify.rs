//! Push notifications to the mobile app owning a screen. Best effort only:
//! callers log failures and never let them affect the operation that triggered them.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

pub const DEFAULT_PUSH_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, token: &str, title: &str, body: &str, data: &Map<String, Value>) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct PushMessage<'a> {
    to: &'a str,
    sound: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a Map<String, Value>,
}

/// Expo-style push endpoint.
#[derive(Debug, Clone)]
pub struct ExpoPushNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl ExpoPushNotifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build().context("building push client")?;
        Ok(Self { client, endpoint: endpoint.into() })
    }
}

#[async_trait]
impl Notifier for ExpoPushNotifier {
    async fn send(&self, token: &str, title: &str, body: &str, data: &Map<String, Value>) -> Result<()> {
        let msg = PushMessage { to: token, sound: "default", title, body, data };
        let resp = self.client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&msg)
            .send()
            .await
            .context("push request failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("push endpoint returned HTTP {}", resp.status()));
        }
        Ok(())
    }
}

/// Used when no push endpoint is configured: the notification only reaches the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, _token: &str, title: &str, _body: &str, data: &Map<String, Value>) -> Result<()> {
        info!(target: "notify", title = %title, keys = data.len(), "push delivery disabled; notification dropped");
        Ok(())
    }
}
