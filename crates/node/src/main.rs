// Path: crates/node/src/main.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Attestor Node
//!
//! The issuer service binary: loads the TOML configuration, opens the redb
//! store, registers the configured issuer instances, and serves the public
//! gateway plus the operational telemetry endpoints until interrupted.

use anyhow::{Context, Result};
use attestor_issuer::{Issuer, LocalSignerProvider};
use attestor_status::allocator::AllocatorConfig;
use attestor_storage::RedbStore;
use attestor_types::config::IssuerInstance;
use clap::Parser;
use http_issuer_gateway::GatewayConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about = "The Attestor issuer service node")]
struct NodeOpts {
    /// Path to the node configuration file.
    #[arg(long, default_value = "attestor.toml")]
    config: PathBuf,

    /// Overrides the configured public listen address.
    #[arg(long)]
    listen_addr: Option<String>,
}

#[derive(Deserialize, Debug)]
struct NodeConfig {
    /// Public gateway bind address.
    #[serde(default = "defaults::listen_addr")]
    listen_addr: String,
    /// Operational (metrics/health) bind address.
    #[serde(default = "defaults::ops_addr")]
    ops_addr: String,
    /// Path of the redb database file.
    #[serde(default = "defaults::db_path")]
    db_path: PathBuf,
    /// Externally visible base URL for minted status-list URLs.
    public_base: String,
    /// Age in seconds past which a pending reservation is recoverable.
    #[serde(default = "defaults::reservation_timeout_secs")]
    reservation_timeout_secs: u64,
    /// Interval in seconds between reservation recovery sweeps.
    #[serde(default = "defaults::recovery_interval_secs")]
    recovery_interval_secs: u64,
    /// Per-IP rate limiting and body limits.
    #[serde(default)]
    gateway: GatewaySection,
    /// Issuer instances registered at startup.
    #[serde(default)]
    instances: Vec<IssuerInstance>,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
struct GatewaySection {
    rps: u32,
    burst: u32,
    body_limit_kb: usize,
    trusted_proxies: Vec<String>,
    request_timeout_secs: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            rps: 50,
            burst: 200,
            body_limit_kb: 1024,
            trusted_proxies: vec![],
            request_timeout_secs: 10,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn listen_addr() -> String {
        "127.0.0.1:8080".into()
    }
    pub fn ops_addr() -> String {
        "127.0.0.1:9090".into()
    }
    pub fn db_path() -> PathBuf {
        "attestor.redb".into()
    }
    pub fn reservation_timeout_secs() -> u64 {
        300
    }
    pub fn recovery_interval_secs() -> u64 {
        60
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    attestor_telemetry::init::init_tracing("info");

    let opts = NodeOpts::parse();
    let raw = std::fs::read_to_string(&opts.config)
        .with_context(|| format!("reading config file {}", opts.config.display()))?;
    let mut config: NodeConfig = toml::from_str(&raw).context("parsing config file")?;
    if let Some(listen) = opts.listen_addr {
        config.listen_addr = listen;
    }

    let store = Arc::new(
        RedbStore::open(&config.db_path)
            .map_err(|e| anyhow::anyhow!("opening store at {}: {}", config.db_path.display(), e))?,
    );

    let issuer = Issuer::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(LocalSignerProvider::new()),
        config.public_base.clone(),
    )
    .with_allocator_config(AllocatorConfig {
        reservation_timeout: Duration::from_secs(config.reservation_timeout_secs),
        ..AllocatorConfig::default()
    });

    for instance in &config.instances {
        issuer
            .instances()
            .register(instance)
            .await
            .map_err(|e| anyhow::anyhow!("registering instance '{}': {}", instance.id, e))?;
    }
    tracing::info!(
        instances = config.instances.len(),
        db = %config.db_path.display(),
        "attestor node starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ops_addr: SocketAddr = config
        .ops_addr
        .parse()
        .with_context(|| format!("invalid ops_addr '{}'", config.ops_addr))?;
    let ops_rx = shutdown_rx.clone();
    let ops_handle = tokio::spawn(async move {
        attestor_telemetry::http::run_server(ops_addr, ops_rx).await;
    });

    let gateway = GatewayConfig {
        listen_addr: config.listen_addr.clone(),
        rps: config.gateway.rps,
        burst: config.gateway.burst,
        body_limit_kb: config.gateway.body_limit_kb,
        trusted_proxies: config.gateway.trusted_proxies.clone(),
        request_timeout: Duration::from_secs(config.gateway.request_timeout_secs),
    };
    let issuer = Arc::new(issuer);

    // Periodic recovery sweep: reconciles reservations left pending by
    // crashed issuances (promote if the credential exists, reclaim
    // otherwise).
    let sweep_issuer = issuer.clone();
    let sweep_ids: Vec<String> = config.instances.iter().map(|i| i.id.clone()).collect();
    let mut sweep_rx = shutdown_rx.clone();
    let sweep_interval = Duration::from_secs(config.recovery_interval_secs.max(1));
    let sweeper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await; // the first tick fires immediately
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for id in &sweep_ids {
                        match sweep_issuer.recover(id).await {
                            Ok(0) => {}
                            Ok(reclaimed) => tracing::info!(
                                instance = %id,
                                reclaimed,
                                "recovery sweep reclaimed positions"
                            ),
                            Err(e) => tracing::warn!(
                                instance = %id,
                                error = %e,
                                "recovery sweep failed"
                            ),
                        }
                    }
                }
                _ = sweep_rx.changed() => break,
            }
        }
    });

    let gateway_rx = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = http_issuer_gateway::run_server(gateway, issuer, gateway_rx).await {
            tracing::error!(error = %e, "gateway exited with error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("installing CTRL+C handler")?;
    tracing::info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    let _ = server.await;
    let _ = sweeper.await;
    ops_handle.abort();
    Ok(())
}
