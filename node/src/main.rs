// Copyright (c) 2026 Ekehi Network. MIT License.
// See LICENSE for details.

//! # Ekehi Node
//!
//! Entry point for the `ekehi-node` binary. Parses the CLI, initializes
//! logging, opens the store (with retries — a node that cannot persist
//! exits non-zero rather than silently losing its chain), assembles the
//! protocol node, and serves the HTTP API until SIGINT/SIGTERM.

mod api;
mod cli;
mod logging;
mod metrics;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use ekehi_protocol::config::{STORE_OPEN_RETRIES, STORE_RETRY_BASE_DELAY};
use ekehi_protocol::crypto::wallet::Wallet;
use ekehi_protocol::node::Node;
use ekehi_protocol::store::{Section, Store};
use ekehi_protocol::NodeConfig;

use cli::EkehiNodeCli;
use logging::LogFormat;
use metrics::NodeMetrics;

/// How often the background updater refreshes the Prometheus gauges.
const METRICS_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = EkehiNodeCli::parse();
    logging::init_logging(
        &format!(
            "ekehi_node={level},ekehi_protocol={level},tower_http=warn",
            level = cli.log_level
        ),
        LogFormat::from_str_lossy(&cli.log_format),
    );

    let public_url = cli.resolve_public_url();
    tracing::info!(
        port = cli.port,
        public_url = %public_url,
        data_dir = %cli.data_dir.display(),
        seeds = cli.seeds.len(),
        "starting ekehi-node"
    );

    // --- Persistent storage (exit non-zero if it cannot be opened) ---
    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("failed to create data directory {}", cli.data_dir.display()))?;
    let store = Store::open_with_retries(&cli.data_dir, STORE_OPEN_RETRIES, STORE_RETRY_BASE_DELAY)
        .with_context(|| {
            format!(
                "failed to open store at {} after {STORE_OPEN_RETRIES} attempts",
                cli.data_dir.display()
            )
        })?;

    // --- Effective configuration: stored values, CLI overrides on top ---
    let stored_config: Option<NodeConfig> = store.load(Section::Config).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "stored config unreadable, using defaults");
        None
    });
    let had_stored_config = stored_config.is_some();
    let mut config = stored_config.unwrap_or_default();

    if let Some(difficulty) = cli.difficulty {
        config.difficulty = difficulty.max(1);
    }
    match cli.miner_address {
        Some(ref address) => config.miner_address = address.clone(),
        None if !had_stored_config => {
            // First run without an explicit reward address: generate a
            // wallet and keep the key next to the data, like any node
            // operator would want.
            let wallet = Wallet::generate();
            let key_path = cli.data_dir.join("miner.key");
            std::fs::write(&key_path, &wallet.private_key)
                .with_context(|| format!("failed to write {}", key_path.display()))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
            }
            tracing::info!(
                address = %wallet.address,
                key_path = %key_path.display(),
                "generated miner wallet"
            );
            config.miner_address = wallet.address;
        }
        None => {}
    }

    // --- Protocol node ---
    let node = Node::new(config, store, cli.seeds.clone(), public_url);
    node.set_mining_enabled(!cli.no_mine);
    node.start();

    // --- HTTP API ---
    let node_metrics = Arc::new(NodeMetrics::new());
    let state = api::AppState {
        node: Arc::clone(&node),
        metrics: Arc::clone(&node_metrics),
    };
    let router = api::create_router(state);

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API listener on {addr}"))?;
    tracing::info!("API listening on {addr}");

    // --- Prometheus gauge updater ---
    let gauge_node = Arc::clone(&node);
    let gauge_metrics = Arc::clone(&node_metrics);
    let gauge_updater = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(METRICS_REFRESH_INTERVAL);
        loop {
            ticker.tick().await;
            gauge_metrics.refresh(&gauge_node.stats());
        }
    });

    // --- Serve until shutdown ---
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    tracing::info!("shutdown signal received, stopping node");
    gauge_updater.abort();
    node.stop().await;
    tracing::info!("ekehi-node stopped");
    Ok(())
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
