//! Wallet address oracles.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Boolean oracle deciding whether a wallet address is acceptable.
/// `Err` means the oracle itself could not be reached, not that the address is bad.
#[async_trait]
pub trait WalletValidator: Send + Sync {
    async fn is_valid(&self, address: &str) -> Result<bool>;
}

static EVM_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static regex"));

/// Offline check of the address shape. Used when no oracle URL is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormatWalletValidator;

#[async_trait]
impl WalletValidator for FormatWalletValidator {
    async fn is_valid(&self, address: &str) -> Result<bool> { Ok(EVM_ADDRESS.is_match(address)) }
}

/// Remote lookup: `GET <base>?owner=<address>`. HTTP 200 means known, any other
/// status means rejected, transport failures are errors.
#[derive(Debug, Clone)]
pub struct OracleWalletValidator {
    client: reqwest::Client,
    base: String,
}

impl OracleWalletValidator {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build().context("building wallet oracle client")?;
        Ok(Self { client, base: base.into() })
    }

    fn lookup_url(&self, address: &str) -> String {
        let sep = if self.base.contains('?') { '&' } else { '?' };
        format!("{}{}owner={}", self.base, sep, urlencoding::encode(address))
    }
}

#[async_trait]
impl WalletValidator for OracleWalletValidator {
    async fn is_valid(&self, address: &str) -> Result<bool> {
        let resp = self.client.get(self.lookup_url(address)).send().await
            .context("wallet oracle request failed")?;
        let status = resp.status();
        debug!(target: "wallet", status = %status, "wallet oracle answered");
        Ok(status == reqwest::StatusCode::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn format_validator_accepts_evm_addresses_only() {
        let v = FormatWalletValidator;
        assert!(v.is_valid("0x52908400098527886E0F7030069857D2E4169EE7").await.unwrap());
        assert!(v.is_valid("0xde709f2102306220921060314715629080e2fb77").await.unwrap());
        assert!(!v.is_valid("0xABC").await.unwrap());
        assert!(!v.is_valid("52908400098527886E0F7030069857D2E4169EE7").await.unwrap());
        assert!(!v.is_valid("0x52908400098527886E0F7030069857D2E4169EEZ").await.unwrap());
    }

    #[test]
    fn oracle_url_carries_encoded_owner() {
        let v = OracleWalletValidator::new("https://oracle.example/nft/v2/KEY/getNFTs").unwrap();
        assert_eq!(v.lookup_url("0xAB&c"), "https://oracle.example/nft/v2/KEY/getNFTs?owner=0xAB%26c");
        let v = OracleWalletValidator::new("https://oracle.example/lookup?chain=eth").unwrap();
        assert_eq!(v.lookup_url("0x1"), "https://oracle.example/lookup?chain=eth&owner=0x1");
    }
}
