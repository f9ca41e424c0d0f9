//! pymentor-server binary
//!
//! Loads a YAML configuration, wires the mentor agent and serves the chat
//! API until Ctrl+C or SIGTERM.

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use pymentor_core::{config::ConfigLoader, MentorAgent};
use pymentor_sandbox::ServerConfig;
use pymentor_server::{apply_overrides, check_execution_service, shutdown_signal, ChatServer};

#[derive(Parser, Debug)]
#[clap(author, version, about = "pymentor server - a Python tutoring agent over HTTP")]
struct Cli {
    #[clap(long, short, default_value = "pymentor.yaml", help = "Path to the YAML configuration file")]
    config: String,

    #[clap(long, default_value = "127.0.0.1:3001")]
    bind_addr: String,

    #[clap(long, short, default_value = "info")]
    log_level: String,

    #[clap(long, help = "Run snippets in-process instead of calling the execution service")]
    local_executor: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    log::info!("Loading configuration from file: {}", cli.config);
    let config = apply_overrides(ConfigLoader::from_file(&cli.config).await?, cli.local_executor)?;
    log::info!("Configuration loaded successfully for agent: {}", config.agent.name);

    check_execution_service(&config).await;
    let agent = MentorAgent::from_config(&config)?;

    let server_config = ServerConfig::default()
        .with_bind_addr_str(&cli.bind_addr)?
        .with_cors(true)
        .with_logging(true);

    log::info!("Starting mentor server on {}...", server_config.bind_addr);
    let server = ChatServer::new(agent).with_config(server_config);

    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    log::info!("Mentor server shut down gracefully.");
    Ok(())
}
