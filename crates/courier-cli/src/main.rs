use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use courier_core::{AppBuilder, CourierConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Payment callback webhook relay", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "COURIER_CONFIG", default_value = "courier.yaml")]
    config: PathBuf,

    /// Listen address, overrides `server.listen`
    #[arg(long, env = "COURIER_LISTEN")]
    listen: Option<String>,

    /// Worker count, overrides `workers.count`
    #[arg(long, env = "COURIER_WORKERS")]
    workers: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = CourierConfig::load(Some(args.config.as_path()))?;
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(workers) = args.workers {
        config.workers.count = workers;
    }

    let app = AppBuilder::new(config).build().await?;
    let listener = tokio::net::TcpListener::bind(&app.config().server.listen).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        workers = app.config().workers.count,
        "courier listening"
    );

    let running = app.start();
    axum::serve(
        listener,
        app.router()
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    running.shutdown().await;
    Ok(())
}
