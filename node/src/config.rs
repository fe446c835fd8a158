//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use can_rpc::RetryPolicy;
use can_staking::validate_news;
use can_types::{AccountId, NewsDraft, StakingParams};

use crate::{LogFormat, NodeError};

/// A session registered at startup under a fixed token, for development
/// and tests where no external sign-in flow exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSeed {
    pub account: AccountId,
    pub token: String,
}

/// Configuration for a staking node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// Whether to enable the HTTP API.
    #[serde(default = "default_true")]
    pub enable_rpc: bool,

    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Whether to enable the WebSocket change feed.
    #[serde(default)]
    pub enable_websocket: bool,

    #[serde(default = "default_ws_port")]
    pub websocket_port: u16,

    /// Buffered change notifications per table before slow clients lag.
    #[serde(default = "default_ws_channel_capacity")]
    pub websocket_channel_capacity: usize,

    /// Whether `POST /faucet` credits balances. Development only.
    #[serde(default)]
    pub enable_faucet: bool,

    /// Whether to expose Prometheus metrics at `GET /metrics`.
    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Lifetime of a session token, extended on refresh.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// How often expired sessions are swept.
    #[serde(default = "default_session_sweep_secs")]
    pub session_sweep_secs: u64,

    #[serde(default)]
    pub staking: StakingParams,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub sessions: Vec<SessionSeed>,

    /// News published when the store holds none yet.
    #[serde(default)]
    pub news: Vec<NewsDraft>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./can_data")
}

fn default_lmdb_map_size() -> usize {
    1 << 30
}

fn default_true() -> bool {
    true
}

fn default_rpc_port() -> u16 {
    7077
}

fn default_ws_port() -> u16 {
    7078
}

fn default_ws_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_session_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_session_sweep_secs() -> u64 {
    60
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.session_ttl_secs == 0 {
            return Err(NodeError::Config("session_ttl_secs must be positive".into()));
        }
        if self.websocket_channel_capacity == 0 {
            return Err(NodeError::Config(
                "websocket_channel_capacity must be positive".into(),
            ));
        }
        let shared_port = self.rpc_port == self.websocket_port && self.rpc_port != 0;
        if self.enable_rpc && self.enable_websocket && shared_port {
            return Err(NodeError::Config(format!(
                "rpc_port and websocket_port are both {}",
                self.rpc_port
            )));
        }
        for draft in &self.news {
            validate_news(draft.clone())
                .map_err(|e| NodeError::Config(format!("news \"{}\": {e}", draft.title)))?;
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            lmdb_map_size: default_lmdb_map_size(),
            enable_rpc: true,
            rpc_port: default_rpc_port(),
            enable_websocket: false,
            websocket_port: default_ws_port(),
            websocket_channel_capacity: default_ws_channel_capacity(),
            enable_faucet: false,
            enable_metrics: false,
            log_format: LogFormat::Human,
            log_level: default_log_level(),
            session_ttl_secs: default_session_ttl_secs(),
            session_sweep_secs: default_session_sweep_secs(),
            staking: StakingParams::default(),
            retry: RetryPolicy::default(),
            sessions: Vec::new(),
            news: Vec::new(),
        }
    }
}
