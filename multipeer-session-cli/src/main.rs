use clap::{ArgAction, Parser, Subcommand};
use multipeer_session_core::FileIdentityStore;
use multipeer_session_cli::application::{protocol, run_demo, serve, EchoPeer};
use multipeer_session_cli::{CliError, LogConfig, Result};
use multipeer_session_p2p::{CoordinatorConfig, LoopbackNetwork, LoopbackTransport, SessionCoordinator};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;

const DEFAULT_SERVICE_TYPE: &str = "multipeer-demo";

#[derive(Parser)]
#[command(name = "multipeer-cli")]
#[command(
    version,
    about = "Multipeer Session CLI - nearby peer sessions over an in-memory network"
)]
struct Cli {
    /// Display name of the local peer
    #[arg(short = 'n', long, env = "MULTIPEER_NAME", default_value = "Multipeer Device", global = true)]
    name: String,

    /// Directory holding the persisted local identity (ephemeral if unset)
    #[arg(long, env = "MULTIPEER_IDENTITY_DIR", global = true)]
    identity_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log level for the multipeer crates, overrides -v (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<tracing::Level>,

    /// Disable log output
    #[arg(long, global = true)]
    no_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Apply the log flags on top of a subcommand's preset
    fn log_config(&self, preset: LogConfig) -> LogConfig {
        let config = match self.log_level {
            Some(level) => preset.with_level(level),
            None => preset,
        };
        if self.no_logs {
            config.without_logs()
        } else {
            config
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, invite and exchange a message with a local echo peer
    Demo {
        /// Service type to advertise and browse under
        #[arg(short = 's', long, default_value = DEFAULT_SERVICE_TYPE)]
        service_type: String,

        /// Message sent to the echo peer
        #[arg(short = 'm', long, default_value = "hello")]
        message: String,
    },

    /// Serve the JSON-lines bridge on stdin/stdout
    Bridge {
        /// Add an auto-accepting echo peer with this name (repeatable)
        #[arg(long = "echo-peer")]
        echo_peers: Vec<String>,

        /// Service type the echo peers advertise under
        #[arg(short = 's', long, default_value = DEFAULT_SERVICE_TYPE)]
        service_type: String,
    },

    /// Print the JSON schema of the bridge envelopes
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&protocol::schema())?);
        }
        Commands::Demo {
            service_type,
            message,
        } => {
            cli.log_config(LogConfig::from_verbosity(cli.verbose)).init()?;

            let network = LoopbackNetwork::new();
            let coordinator = build_coordinator(&network, &cli.name, cli.identity_dir.clone())?;
            let echoed = run_demo(&network, coordinator, service_type, message).await?;
            info!("✓ Demo finished, echo: {}", String::from_utf8_lossy(&echoed));
        }
        Commands::Bridge {
            echo_peers,
            service_type,
        } => {
            let preset = match cli.verbose {
                0 => LogConfig::quiet(),
                n => LogConfig::from_verbosity(n),
            };
            cli.log_config(preset).init()?;

            let network = LoopbackNetwork::new();
            let coordinator = build_coordinator(&network, &cli.name, cli.identity_dir.clone())?;
            let _echoes = echo_peers
                .iter()
                .map(|name| EchoPeer::spawn(&network, name, service_type))
                .collect::<Result<Vec<_>>>()?;

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Cannot listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            let mut stdout = tokio::io::stdout();
            serve(coordinator, BufReader::new(tokio::io::stdin()), &mut stdout, shutdown).await?;
        }
    }

    Ok(())
}

fn build_coordinator(
    network: &LoopbackNetwork,
    name: &str,
    identity_dir: Option<PathBuf>,
) -> Result<Arc<SessionCoordinator<LoopbackTransport>>> {
    if name.trim().is_empty() {
        return Err(CliError::InvalidConfig(
            "display name must not be empty".to_string(),
        ));
    }

    let config = CoordinatorConfig::new(name);
    match identity_dir {
        Some(dir) => {
            info!("Using identity directory: {}", dir.display());
            let store = FileIdentityStore::new(dir);
            Ok(SessionCoordinator::with_identity_store(network.join(), config, &store)?)
        }
        None => Ok(SessionCoordinator::new(network.join(), config)),
    }
}
