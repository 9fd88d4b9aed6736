//! HTTP client for the daiara API, used by operator tooling and the integration tests.

use anyhow::{Context, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::artwork::{Artwork, ArtworkMetadata};
use crate::screen::Screen;

/// Non-success reply from the server, carrying the `code`/`message` of the error body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("HTTP {status}: {message}")]
pub struct RemoteError {
    pub status: u16,
    pub code: String,
    pub message: String,
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    client: reqwest::Client,
    operator_token: String,
}

async fn expect_json<T: DeserializeOwned>(resp: reqwest::Response, expected: StatusCode) -> Result<T> {
    let status = resp.status();
    if status != expected {
        let body: serde_json::Value = resp.json().await.unwrap_or(json!({}));
        return Err(RemoteError {
            status: status.as_u16(),
            code: body.get("code").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            message: body.get("message").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        }
        .into());
    }
    resp.json::<T>().await.context("decoding response body")
}

impl HttpClient {
    /// `operator_token` is sent on the operator endpoints only.
    pub fn new(base: &str, operator_token: impl Into<String>) -> Result<Self> {
        let base = Url::parse(base).context("invalid base URL")?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self { base, client, operator_token: operator_token.into() })
    }

    fn bearer(&self) -> String { format!("Bearer {}", self.operator_token) }

    pub async fn health(&self) -> Result<String> {
        let resp = self.client.get(self.base.join("/")?).send().await?;
        if !resp.status().is_success() {
            return Err(RemoteError { status: resp.status().as_u16(), code: String::new(), message: "health check failed".into() }.into());
        }
        Ok(resp.text().await?)
    }

    pub async fn register_screen(&self, push_notification_token: Option<&str>) -> Result<Screen> {
        let resp = self.client
            .post(self.base.join("/screens")?)
            .header(AUTHORIZATION, self.bearer())
            .json(&json!({ "push_notification_token": push_notification_token }))
            .send()
            .await?;
        expect_json(resp, StatusCode::OK).await
    }

    /// Returns the session credential.
    pub async fn start_session(&self, screen_id: &str) -> Result<String> {
        let mut url = self.base.join("/sessions")?;
        url.set_query(Some(&format!("screen_id={}", urlencoding::encode(screen_id))));
        let resp = self.client.get(url).header(AUTHORIZATION, self.bearer()).send().await?;
        let body: serde_json::Value = expect_json(resp, StatusCode::CREATED).await?;
        body.get("session_token")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .context("session_token missing from response")
    }

    pub async fn link_wallet(&self, screen_id: &str, session_token: &str, wallet_address: &str) -> Result<()> {
        let resp = self.client
            .post(self.base.join("/wallet")?)
            .json(&json!({ "screen_id": screen_id, "session_token": session_token, "wallet_address": wallet_address }))
            .send()
            .await?;
        let _: serde_json::Value = expect_json(resp, StatusCode::OK).await?;
        Ok(())
    }

    pub async fn upload_artwork(
        &self,
        screen_id: &str,
        session_token: &str,
        file_name: &str,
        bytes: Vec<u8>,
        metadata: &ArtworkMetadata,
    ) -> Result<Artwork> {
        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string()))
            .text("metadata", serde_json::to_string(metadata)?);
        let resp = self.client
            .post(self.base.join("/artworks")?)
            .header(AUTHORIZATION, self.bearer())
            .header("screen-id", screen_id)
            .header("screen-session-token", session_token)
            .multipart(form)
            .send()
            .await?;
        expect_json(resp, StatusCode::CREATED).await
    }
}
