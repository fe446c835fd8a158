//! CAN Network staking daemon.

use std::path::PathBuf;

use anyhow::Context;
use can_node::{init_logging, CanNode, LogFormat, NodeConfig};
use clap::Parser;

#[derive(Parser)]
#[command(name = "can-daemon", about = "CAN Network staking node daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "CAN_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the LMDB store.
    #[arg(long, env = "CAN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP API port.
    #[arg(long, env = "CAN_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Enable the WebSocket change feed.
    #[arg(long, env = "CAN_ENABLE_WEBSOCKET")]
    websocket: bool,

    /// WebSocket port.
    #[arg(long, env = "CAN_WS_PORT")]
    websocket_port: Option<u16>,

    /// Enable the Prometheus metrics endpoint.
    #[arg(long, env = "CAN_ENABLE_METRICS")]
    metrics: bool,

    /// Enable the development faucet endpoint.
    #[arg(long, env = "CAN_ENABLE_FAUCET")]
    faucet: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "CAN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "CAN_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Node operations.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Configuration helpers.
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Run the node until SIGINT/SIGTERM.
    Run,
}

#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
}

impl Cli {
    /// Layer CLI flags and env vars over the file (or default) config.
    fn resolve_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(port) = self.websocket_port {
            config.websocket_port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        config.enable_websocket |= self.websocket;
        config.enable_metrics |= self.metrics;
        config.enable_faucet |= self.faucet;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    match cli.command {
        Command::Config {
            action: ConfigAction::Show,
        } => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Node {
            action: NodeAction::Run,
        } => {
            init_logging(config.log_format, &config.log_level)?;
            tracing::info!(
                "Starting CAN staking node (RPC:{}, WS:{})",
                if config.enable_rpc {
                    config.rpc_port.to_string()
                } else {
                    "off".into()
                },
                if config.enable_websocket {
                    config.websocket_port.to_string()
                } else {
                    "off".into()
                },
            );
            if config.enable_faucet {
                tracing::warn!("faucet is enabled; balances can be credited freely");
            }

            let mut node = CanNode::new(config)?;
            node.start().await?;
            node.wait_for_shutdown().await?;

            tracing::info!("Shutdown signal received, stopping node");
            node.stop().await?;
            tracing::info!("CAN daemon exited cleanly");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "can-daemon",
            "--rpc-port",
            "9100",
            "--faucet",
            "--log-format",
            "json",
            "node",
            "run",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.rpc_port, 9100);
        assert!(config.enable_faucet);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.websocket_port, 7078);
    }

    #[test]
    fn config_show_parses() {
        assert!(Cli::try_parse_from(["can-daemon", "config", "show"]).is_ok());
        assert!(Cli::try_parse_from(["can-daemon", "node", "stop"]).is_err());
    }
}
