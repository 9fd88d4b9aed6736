//!
//! daiara server binary
//! --------------------
//! Command-line entry point for the daiara HTTP service. Configuration comes from a
//! JSON file, `DAIARA_*` environment variables and CLI flags (see `daiara::config`).

use anyhow::{Context, Result};
use std::env;

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("daiara server\n\nUSAGE:\n  daiara_server [--config PATH] [--http-port N] [--data-dir PATH]\n\nOPTIONS:\n  --config PATH      JSON config file (env: DAIARA_CONFIG)\n  --http-port N      HTTP API port (env: DAIARA_HTTP_PORT, default 7878)\n  --data-dir PATH    Records and uploaded objects (env: DAIARA_DATA_DIR, default data)\n\nREQUIRED (file or env):\n  signingKey         DAIARA_SIGNING_KEY\n  sharedAuthToken    DAIARA_SHARED_AUTH_TOKEN\n\nOPTIONAL:\n  sessionWindow      DAIARA_SESSION_WINDOW (seconds, default 300)\n  walletOracleUrl    DAIARA_WALLET_ORACLE_URL\n  pushEndpoint       DAIARA_PUSH_ENDPOINT\n  snapshotIntervalMs DAIARA_SNAPSHOT_INTERVAL_MS (default 5000, 0 disables)\n");
        return Ok(());
    }

    let config = daiara::config::Config::load().context("loading configuration")?;
    tracing::info!(target: "startup", "configuration loaded: {:?}", config);
    daiara::server::run_with_config(config).await
}
