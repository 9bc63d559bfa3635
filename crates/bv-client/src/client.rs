//! # Session Bring-Up
//!
//! Connect, derive the key, establish the trust anchor, and hand back a
//! ready facade. A client root without a `hash` file is fresh: the
//! server's current root is adopted (trust on first use) and the volume
//! is formatted. Otherwise the persisted hash is the sole trust anchor
//! and the existing filesystem is opened as-is.

use std::os::unix::fs::DirBuilderExt;

use shared_crypto::{derive_key, SessionNonce};
use tracing::info;

use crate::facade::FsFacade;
use crate::fs::Volume;
use crate::transport::{create_top_hash_file, TopHashFile, Transport};
use crate::{ClientConfig, FsError, TransportError};

/// Start a session against the server named in `config`.
pub fn start(config: &ClientConfig) -> Result<FsFacade<Transport>, FsError> {
    if !config.root.exists() {
        std::fs::DirBuilder::new()
            .mode(0o700)
            .create(&config.root)
            .map_err(TransportError::Io)?;
    }

    let stream = Transport::connect(&config.host, config.port)?;
    let key = derive_key(&config.password).map_err(TransportError::Crypto)?;
    let nonce = SessionNonce::generate();

    let hash_path = config.root.join("hash");
    let fresh = !hash_path.exists();
    let top_hash = if fresh {
        create_top_hash_file(&hash_path)?
    } else {
        TopHashFile::new(hash_path)
    };

    let mut transport = Transport::new(stream, key, nonce, top_hash);
    if fresh {
        transport.adopt_server_root()?;
    }

    let mut volume = Volume::new(transport);
    if fresh {
        volume.format()?;
        info!("[client] initialized fresh store at {}", config.root.display());
    } else {
        info!("[client] opened existing store at {}", config.root.display());
    }

    Ok(FsFacade::new(volume))
}
