//! CipherVault Sync Server
//!
//! A self-hostable sync server for CipherVault clients. The server
//! stores only opaque ciphertexts and per-account KDF salts -- it never
//! possesses vault keys or plaintext items.

mod auth;
mod config;
mod error;
mod handlers;
mod reconcile;
mod server;
mod storage;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ciphervault-server", about = "CipherVault sync server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ciphervault.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Database path override
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        config::ServerConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file found, using defaults");
        config::ServerConfig::default()
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(database) = cli.database {
        cfg.storage_path = database;
    }

    tracing::info!("Starting CipherVault server on {}", cfg.listen_addr);

    let storage = storage::ServerStorage::open(&cfg.storage_path)?;
    let app = server::build_router(storage, &cfg);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
