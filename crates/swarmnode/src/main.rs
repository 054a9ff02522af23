//! swarmnode — swarm node ops agent
//!
//! Runs the reward monitor, service watch, heartbeat and credential backup
//! loops for one swarm worker and serves operator commands over HTTP.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use swarm_peer::SwarmLog;
use swarmnode::commands::handle_command;
use swarmnode::config::{NodeConfig, vps_id_from_name};
use swarmnode::server::run_server;
use swarmnode::SwarmNode;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_CONFIG: &str = "/etc/swarmnode/config.json";

#[derive(Parser)]
#[command(name = "swarmnode")]
#[command(about = "Swarm node ops agent")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent (background loops plus the command server)
    Run {
        /// Path to config file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Generate a config file with a fresh auth token
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,

        /// Display name for this VPS (defaults to the hostname)
        #[arg(long)]
        vps_name: Option<String>,

        /// Operator webhook receiver; enables outbound delivery
        #[arg(long)]
        webhook_url: Option<String>,
    },

    /// Print a one-shot status report
    Status {
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Wrap the report in <pre> with HTML escaping
        #[arg(long)]
        html: bool,
    },

    /// Execute one operator command and print the result
    ///
    /// Examples:
    ///   swarmnode exec check_ip
    ///   swarmnode exec get_logs --params '{"lines": 20}'
    Exec {
        /// Command name (e.g. node_status, get_logs, backup_now)
        command: String,

        /// JSON parameters for the command (default: {})
        #[arg(long, default_value = "{}")]
        params: String,

        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Print the peer identity and latest activity found in a worker log
    ParseLog {
        /// Path to the worker log
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Keep stdout clean for exec output
    if !matches!(cli.command, Commands::Exec { .. }) {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(EnvFilter::from_default_env().add_directive("swarmnode=info".parse()?))
            .init();
    }

    match cli.command {
        Commands::Run { config } => run_agent(config).await?,
        Commands::InitConfig {
            output,
            vps_name,
            webhook_url,
        } => init_config(output, vps_name, webhook_url)?,
        Commands::Status { config, html } => print_status(config, html).await?,
        Commands::Exec {
            command,
            params,
            config,
        } => exec_command(&command, &params, config).await?,
        Commands::ParseLog { path } => parse_log(path).await?,
    }

    Ok(())
}

// ─── Run ─────────────────────────────────────────────────────────────────────

async fn run_agent(config_path: PathBuf) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "starting swarmnode");

    let config = NodeConfig::load(&config_path)?;
    info!(
        vps_name = %config.vps_name,
        vps_id = %config.vps_id,
        webhook = config.webhook_enabled,
        telegram = config.telegram.is_some(),
        eoa = config.rpc_url.is_some(),
        "loaded config"
    );

    let listener = TcpListener::bind(config.listen_addr()).await?;
    let node = Arc::new(SwarmNode::new(config)?);
    let shutdown = CancellationToken::new();

    if node.config.autostart.reward_monitor {
        node.start_reward_monitor();
    }
    if node.config.autostart.service_watch {
        node.start_service_watch();
    }
    node.spawn_housekeeping(&shutdown);
    node.announce_startup().await;

    let server = tokio::spawn(run_server(listener, node.clone(), shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    shutdown.cancel();
    node.shutdown();
    server.await??;
    Ok(())
}

// ─── InitConfig ───────────────────────────────────────────────────────────────

fn init_config(
    output: PathBuf,
    vps_name: Option<String>,
    webhook_url: Option<String>,
) -> anyhow::Result<()> {
    let vps_name = vps_name.unwrap_or_else(|| {
        hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "swarmnode".to_string())
    });

    let config = NodeConfig {
        vps_id: vps_id_from_name(&vps_name),
        vps_name,
        auth_token: uuid::Uuid::new_v4().to_string(),
        webhook_enabled: webhook_url.is_some(),
        webhook_url: webhook_url.unwrap_or_default(),
        ..NodeConfig::default()
    };

    config.save(&output)?;

    println!("Config written to {}", output.display());
    println!();
    println!("  VPS id:     {}", config.vps_id);
    println!("  Auth token: {}", config.auth_token);
    println!();
    println!("Share the auth token with the operator webhook, then run:");
    println!("  swarmnode run --config {}", output.display());

    Ok(())
}

// ─── Status ───────────────────────────────────────────────────────────────────

async fn print_status(config_path: PathBuf, html: bool) -> anyhow::Result<()> {
    let node = SwarmNode::new(NodeConfig::load(&config_path)?)?;
    let report = node.status_report().await?;
    if html {
        println!("{}", report.to_html());
    } else {
        println!("{}", report.render());
    }
    Ok(())
}

// ─── Exec ─────────────────────────────────────────────────────────────────────

async fn exec_command(command: &str, params_str: &str, config_path: PathBuf) -> anyhow::Result<()> {
    let params: serde_json::Value = serde_json::from_str(params_str)
        .map_err(|e| anyhow::anyhow!("invalid JSON params: {e}"))?;

    let config = if config_path.exists() {
        NodeConfig::load(&config_path)?
    } else {
        NodeConfig::default()
    };
    let node = SwarmNode::new(config)?;

    match handle_command(&node, command, &params).await {
        Ok(result) => {
            println!("{result}");
        }
        Err(e) => {
            let err = serde_json::json!({
                "success": false,
                "error": e.to_string(),
                "command": command,
            });
            println!("{}", serde_json::to_string_pretty(&err)?);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ─── ParseLog ─────────────────────────────────────────────────────────────────

async fn parse_log(path: PathBuf) -> anyhow::Result<()> {
    let log = SwarmLog::new(path);
    let (identity, activity) =
        tokio::task::spawn_blocking(move || (log.peer_identity(), log.activity())).await?;

    let out = serde_json::json!({
        "identity": identity,
        "activity": activity,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
