//! # Prometheus Metrics
//!
//! Operational metrics for the node, scraped from `GET /metrics` on the
//! main API port. All metrics live in a dedicated registry namespaced
//! `ekehi` so they never collide with a host process's defaults.
//!
//! Counters are incremented at the event site (API handlers, mining);
//! gauges are refreshed by a background updater task from the facade's
//! stats snapshot.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Registry that owns everything below.
    registry: Registry,
    /// Blocks mined locally.
    pub blocks_mined_total: IntCounter,
    /// Blocks accepted from peers.
    pub blocks_received_total: IntCounter,
    /// Transactions admitted to the mempool.
    pub transactions_admitted_total: IntCounter,
    /// Chain adoptions performed by the sync manager.
    pub chain_adoptions_total: IntCounter,
    /// Current chain height.
    pub chain_height: IntGauge,
    /// Current mempool depth.
    pub mempool_size: IntGauge,
    /// Known peers.
    pub known_peers: IntGauge,
    /// Current mining difficulty.
    pub difficulty: IntGauge,
    /// Estimated hashes per second.
    pub hashrate: Gauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("ekehi".into()), None)
            .expect("failed to create prometheus registry");

        fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
            let c = IntCounter::new(name, help).expect("metric creation");
            registry.register(Box::new(c.clone())).expect("metric registration");
            c
        }

        fn int_gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
            let g = IntGauge::new(name, help).expect("metric creation");
            registry.register(Box::new(g.clone())).expect("metric registration");
            g
        }

        let blocks_mined_total = counter(
            &registry,
            "blocks_mined_total",
            "Blocks mined by this node",
        );
        let blocks_received_total = counter(
            &registry,
            "blocks_received_total",
            "Blocks accepted from peers",
        );
        let transactions_admitted_total = counter(
            &registry,
            "transactions_admitted_total",
            "Transactions admitted to the mempool",
        );
        let chain_adoptions_total = counter(
            &registry,
            "chain_adoptions_total",
            "Longer chains adopted during sync",
        );
        let chain_height = int_gauge(&registry, "chain_height", "Canonical chain height");
        let mempool_size = int_gauge(&registry, "mempool_size", "Pending transactions");
        let known_peers = int_gauge(&registry, "known_peers", "Peers in the peer table");
        let difficulty = int_gauge(&registry, "difficulty", "Current mining difficulty");

        let hashrate = Gauge::new("hashrate", "Estimated hashes per second")
            .expect("metric creation");
        registry
            .register(Box::new(hashrate.clone()))
            .expect("metric registration");

        Self {
            registry,
            blocks_mined_total,
            blocks_received_total,
            transactions_admitted_total,
            chain_adoptions_total,
            chain_height,
            mempool_size,
            known_peers,
            difficulty,
            hashrate,
        }
    }

    /// Refreshes the gauge set from a facade stats snapshot.
    pub fn refresh(&self, stats: &ekehi_protocol::NodeStats) {
        self.chain_height.set(stats.total_blocks as i64);
        self.mempool_size.set(stats.mempool_size as i64);
        self.known_peers.set(stats.network_nodes as i64);
        self.difficulty.set(stats.difficulty as i64);
        self.hashrate.set(stats.hashrate);
    }

    /// Encodes all registered metrics into the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler rendering `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<crate::api::AppState>,
) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_and_encode() {
        let metrics = NodeMetrics::new();
        metrics.blocks_mined_total.inc();
        metrics.chain_height.set(7);

        let text = metrics.encode().unwrap();
        assert!(text.contains("ekehi_blocks_mined_total"));
        assert!(text.contains("ekehi_chain_height 7"));
    }
}
