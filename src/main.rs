use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flowdeck_core::config::ProjectConfig;
use flowdeck_core::event::EventBus;
use flowdeck_engine::{ExecutionEngine, ExecutorRegistry};
use flowdeck_gateway::{AppState, GatewayServer};

/// How many consecutive ports to try when the requested one is taken.
const PORT_SCAN_RANGE: u16 = 20;

#[derive(Parser)]
#[command(name = "flowdeck", version, about = "Visual workflow builder backend")]
struct Cli {
    /// Project root holding skills/, agents/, and settings.json
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Preferred port (the next free port is used when taken)
    #[arg(short, long, default_value = "4173")]
    port: u16,

    /// Do not open a browser after startup
    #[arg(long)]
    no_open: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let root = cli.root.canonicalize().unwrap_or(cli.root);
    let port = resolve_port(cli.port)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no free port in {}..{}",
                cli.port,
                cli.port.saturating_add(PORT_SCAN_RANGE)
            )
        })?;
    let bind = format!("127.0.0.1:{}", port);
    let url = format!("http://{}", bind);
    info!(root = %root.display(), url = %url, "Starting flowdeck");

    let bus = Arc::new(EventBus::default());
    let engine = Arc::new(ExecutionEngine::new(bus.clone(), ExecutorRegistry::with_builtins()));
    let state = Arc::new(AppState::new(ProjectConfig::new(root), bus, engine));
    let server = GatewayServer::new(state);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            signal_token.cancel();
        }
    });

    if !cli.no_open {
        open_browser(&url);
    }

    server.run(&bind, shutdown).await
}

/// Try the requested port first, then scan upward for a free one.
fn resolve_port(preferred: u16) -> Option<u16> {
    (preferred..preferred.saturating_add(PORT_SCAN_RANGE))
        .find(|port| TcpListener::bind(("127.0.0.1", *port)).is_ok())
}

/// Best-effort: a missing opener is logged, never fatal.
fn open_browser(url: &str) {
    let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
    match Command::new(opener).arg(url).spawn() {
        Ok(_) => info!(url = %url, "Opened browser"),
        Err(e) => warn!(error = %e, "Could not open browser"),
    }
}
