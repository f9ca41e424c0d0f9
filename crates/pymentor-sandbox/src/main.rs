//! pymentor-sandbox binary
//!
//! Runs the execution service. Settings come from `PYMENTOR_*` environment
//! variables, which command line flags override.

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use pymentor_core::SandboxConfig;
use pymentor_sandbox::{shutdown_signal, SandboxServer, ServerConfig};
use std::path::PathBuf;

const ENV_BIND_ADDR: &str = "PYMENTOR_SANDBOX_ADDR";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Parser, Debug)]
#[clap(author, version, about = "pymentor execution service - runs Python snippets in isolated process groups")]
struct Cli {
    #[clap(long, help = "Bind address [env: PYMENTOR_SANDBOX_ADDR] [default: 0.0.0.0:8080]")]
    bind_addr: Option<String>,

    #[clap(long, help = "Directory for per-request script files [env: PYMENTOR_EXECUTION_DIR]")]
    execution_dir: Option<PathBuf>,

    #[clap(long, help = "Interpreter used to run scripts [env: PYMENTOR_INTERPRETER]")]
    interpreter: Option<String>,

    #[clap(long, help = "Ceiling for requested timeouts in seconds [env: PYMENTOR_MAX_TIMEOUT]")]
    max_timeout: Option<f64>,

    #[clap(long, help = "Delay between SIGTERM and SIGKILL in milliseconds [env: PYMENTOR_KILL_GRACE_MS]")]
    kill_grace_ms: Option<u64>,

    #[clap(long, help = "Allow cross-origin requests from any origin")]
    cors: bool,

    #[clap(long, short, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let mut sandbox = SandboxConfig::from_env()?;
    if let Some(dir) = cli.execution_dir {
        sandbox.execution_dir = dir;
    }
    if let Some(interpreter) = cli.interpreter {
        sandbox.interpreter = interpreter;
    }
    if let Some(max_timeout) = cli.max_timeout {
        sandbox.max_timeout_seconds = max_timeout;
    }
    if let Some(grace) = cli.kill_grace_ms {
        sandbox.kill_grace_ms = grace;
    }
    sandbox.validate()?;

    match which::which(&sandbox.interpreter) {
        Ok(path) => log::info!("Interpreter: {}", path.display()),
        Err(e) => log::warn!(
            "Interpreter '{}' not found ({}); executions will report launch failures",
            sandbox.interpreter,
            e
        ),
    }

    let bind_addr = cli
        .bind_addr
        .or_else(|| std::env::var(ENV_BIND_ADDR).ok())
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let server_config = ServerConfig::default()
        .with_bind_addr_str(&bind_addr)?
        .with_cors(cli.cors)
        .with_logging(true);

    log::info!("Configuration:");
    log::info!("  Execution dir: {}", sandbox.execution_dir.display());
    log::info!("  Max timeout: {}s", sandbox.max_timeout_seconds);
    log::info!("  Kill grace: {}ms", sandbox.kill_grace_ms);
    log::info!("  Max output: {} bytes per stream", sandbox.max_output_bytes);

    let server = SandboxServer::new(sandbox).with_server_config(server_config);
    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Execution service failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
