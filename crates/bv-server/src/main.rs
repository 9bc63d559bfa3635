//! # BlockVault Server Binary
//!
//! Opens (or formats) the store under `--root`, then serves one client
//! session at a time on the protocol port until interrupted. The Merkle
//! tree is persisted after every session and again at shutdown.

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bv_server::{serve, BlockStore, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "bv-server", version, about = "BlockVault storage server")]
struct Args {
    /// Use directory <dir> for local files
    #[arg(long, value_name = "dir", default_value = "./sv_root/")]
    root: std::path::PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = ServerConfig {
        root: args.root,
        ..ServerConfig::default()
    };

    let mut store = BlockStore::open_or_format(&config.root)?;
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("[server] listening on port {}", config.port);

    tokio::select! {
        result = serve(listener, &mut store) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("[server] shutting down");
        }
    }

    store.persist_tree()?;
    Ok(())
}
