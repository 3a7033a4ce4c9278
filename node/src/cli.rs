//! # CLI Interface
//!
//! Argument parsing for `ekehi-node` using `clap` derive. The canonical
//! invocation is positional — `ekehi-node <port> [publicNodeUrl]` — with
//! flags for everything a deployment might tune. Every configurable
//! value also has an environment variable for container-friendly
//! deployment.
//!
//! The public URL resolves in priority order: the `EKEHI_PUBLIC_URL`
//! environment variable (hosting platforms inject it), then the
//! positional argument, then a localhost default suitable only for
//! single-node development.

use clap::Parser;
use std::path::PathBuf;

/// Ekehi network full node.
///
/// Maintains the local chain, accepts and gossips transactions, mines
/// blocks at the configured difficulty, discovers peers from seeds, and
/// serves the HTTP API on the given port.
#[derive(Parser, Debug, Clone)]
#[command(name = "ekehi-node", about = "Ekehi network full node", version)]
pub struct EkehiNodeCli {
    /// Port for the HTTP API and peer-facing endpoints.
    pub port: u16,

    /// Public URL other nodes use to reach this node
    /// (e.g. "http://node-1.ekehi.network:3000").
    pub public_node_url: Option<String>,

    /// Data directory for the chain store.
    #[arg(long, short = 'd', env = "EKEHI_DATA_DIR", default_value = "./ekehi-data")]
    pub data_dir: PathBuf,

    /// Seed node URL for peer discovery. Repeatable.
    #[arg(long = "seed", env = "EKEHI_SEEDS", value_delimiter = ',')]
    pub seeds: Vec<String>,

    /// Address credited with mining rewards. Generated and persisted on
    /// first run when omitted.
    #[arg(long, env = "EKEHI_MINER_ADDRESS")]
    pub miner_address: Option<String>,

    /// Override the starting difficulty (leading zero hex digits).
    #[arg(long, env = "EKEHI_DIFFICULTY")]
    pub difficulty: Option<u32>,

    /// Disable the auto-mining scheduler (the node still accepts
    /// `/mine` requests and relays blocks).
    #[arg(long)]
    pub no_mine: bool,

    /// Log verbosity: trace, debug, info, warn, error.
    #[arg(long, env = "EKEHI_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format: pretty or json.
    #[arg(long, env = "EKEHI_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl EkehiNodeCli {
    /// Resolves the node's public URL. The environment wins over the
    /// positional argument so hosting platforms can inject the real
    /// externally visible URL at deploy time.
    pub fn resolve_public_url(&self) -> String {
        if let Ok(url) = std::env::var("EKEHI_PUBLIC_URL") {
            if !url.trim().is_empty() {
                return url.trim().trim_end_matches('/').to_string();
            }
        }
        match &self.public_node_url {
            Some(url) => url.trim().trim_end_matches('/').to_string(),
            None => format!("http://127.0.0.1:{}", self.port),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        EkehiNodeCli::command().debug_assert();
    }

    #[test]
    fn positional_port_and_url() {
        let cli = EkehiNodeCli::parse_from(["ekehi-node", "3001", "http://node-1:3001"]);
        assert_eq!(cli.port, 3001);
        assert_eq!(cli.public_node_url.as_deref(), Some("http://node-1:3001"));
    }

    #[test]
    fn port_alone_defaults_everything_else() {
        let cli = EkehiNodeCli::parse_from(["ekehi-node", "3000"]);
        assert_eq!(cli.port, 3000);
        assert!(cli.public_node_url.is_none());
        assert!(cli.seeds.is_empty());
        assert!(!cli.no_mine);
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.data_dir, PathBuf::from("./ekehi-data"));
    }

    #[test]
    fn repeatable_seeds() {
        let cli = EkehiNodeCli::parse_from([
            "ekehi-node",
            "3000",
            "--seed",
            "http://seed-1:3000",
            "--seed",
            "http://seed-2:3000",
        ]);
        assert_eq!(cli.seeds.len(), 2);
    }

    #[test]
    fn public_url_falls_back_to_loopback() {
        let cli = EkehiNodeCli::parse_from(["ekehi-node", "4123"]);
        // Only meaningful when EKEHI_PUBLIC_URL is unset in the test
        // environment; the positional fallback covers that.
        if std::env::var("EKEHI_PUBLIC_URL").is_err() {
            assert_eq!(cli.resolve_public_url(), "http://127.0.0.1:4123");
        }
    }

    #[test]
    fn public_url_strips_trailing_slash() {
        let cli = EkehiNodeCli::parse_from(["ekehi-node", "3000", "http://node-1:3000/"]);
        if std::env::var("EKEHI_PUBLIC_URL").is_err() {
            assert_eq!(cli.resolve_public_url(), "http://node-1:3000");
        }
    }

    #[test]
    fn mining_flag_and_overrides() {
        let cli = EkehiNodeCli::parse_from([
            "ekehi-node",
            "3000",
            "--no-mine",
            "--difficulty",
            "4",
            "--miner-address",
            "EKHabc",
        ]);
        assert!(cli.no_mine);
        assert_eq!(cli.difficulty, Some(4));
        assert_eq!(cli.miner_address.as_deref(), Some("EKHabc"));
    }
}
