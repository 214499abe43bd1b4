//! fieldcheck-api - Inspection management backend
//!
//! Multi-tenant backend where organizations define versioned checklist
//! templates and inspectors fill them against physical assets.

use anyhow::Result;
use clap::Parser;
use fieldcheck_api::{build_router, AppState};
use fieldcheck_common::config::Config;
use fieldcheck_common::db::init_database;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fieldcheck-api", about = "Inspection management backend")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, env = "FIELDCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address from config
    #[arg(long)]
    bind_addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting fieldcheck-api v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(addr) = cli.bind_addr {
        config.bind_addr = addr;
    }

    std::fs::create_dir_all(&config.media_dir)?;

    let pool = init_database(&config.database_path).await?;
    info!("Database ready: {}", config.database_path.display());

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(pool, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("fieldcheck-api listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
