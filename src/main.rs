use anyhow::Result;
use std::sync::Arc;

use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = raffled::config::Cli::parse();
    let cmd = cli.command.clone().unwrap_or(raffled::config::Command::Run);

    match cmd {
        raffled::config::Command::Run => run_server(cli.config).await,
        raffled::config::Command::Init => init_store(&cli.config),
    }
}

fn init_store(config: &raffled::config::Config) -> Result<()> {
    let store = raffled::state::RaffleStore::open(&config.data_file)?;
    info!(data_file = %store.path().display(), "raffle store ready");
    Ok(())
}

async fn run_server(config: raffled::config::Config) -> Result<()> {
    let gate = config.admin_gate();
    if gate.is_insecure_default() {
        warn!("admin key is the insecure default or empty; set RAFFLED_ADMIN_KEY");
    }

    let store = raffled::state::RaffleStore::open(&config.data_file)?;
    // Fail fast on a corrupt data file instead of on the first request.
    let doc = store.load().await?;

    let service = raffled::service::RaffleService::new(Arc::new(store), gate);
    let app = raffled::http::build_router(service)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!(
        bind = %config.bind,
        data_file = %config.data_file.display(),
        raffles = doc.raffles.len(),
        "starting raffled"
    );
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).compact().init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
