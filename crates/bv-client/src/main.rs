//! # BlockVault Client Binary
//!
//! Brings up a session against the server, hands the filesystem to the
//! kernel binding, and flushes everything on the way out.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bv_client::{ClientConfig, KernelBinding, NullBinding};

#[derive(Parser, Debug)]
#[command(name = "bv-client", version, about = "BlockVault filesystem client")]
struct Args {
    /// Server address
    #[arg(long, value_name = "addr", default_value = "127.0.0.1")]
    host: String,

    /// Use directory <dir> for local files
    #[arg(long, value_name = "dir", default_value = "./cl_root/")]
    root: std::path::PathBuf,

    /// Password the session key is derived from
    #[arg(long, value_name = "pw", default_value = "")]
    pass: String,

    /// Mount point handed to the kernel binding
    mount_point: std::path::PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = ClientConfig {
        host: args.host,
        root: args.root,
        password: args.pass,
        ..ClientConfig::default()
    };

    let mut fs = bv_client::start(&config)?;
    NullBinding.run(&args.mount_point, &mut fs)?;

    fs.stop()?;
    info!("[client] clean shutdown");
    Ok(())
}
