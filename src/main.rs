//! wirehub: HTTP-to-WebSocket request/response gateway.
//!
//! ```text
//!   Client ── HTTP ──▶ external boundary ──▶ queue router ──▶ internal boundary
//!                                                                   │
//!                                                              WebSocket
//!                                                                   │
//!   Client ◀── HTTP ── reply correlation ◀── reply frame ◀── backend worker pool
//! ```

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wirehub::{config, lifecycle, observability, Hub, HubConfig, Shutdown};

#[derive(Parser)]
#[command(name = "wirehub")]
#[command(about = "HTTP-to-WebSocket request/response gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wirehub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => HubConfig::default(),
    };

    tracing::info!(
        external = %config.external.bind_address,
        internal = %config.internal.bind_address,
        timeout_secs = config.external.timeout_secs,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let external = TcpListener::bind(&config.external.bind_address).await?;
    let internal = TcpListener::bind(&config.internal.bind_address).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(lifecycle::trigger_on_ctrl_c(shutdown.clone()));

    Hub::new(config).run(external, internal, &shutdown).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
