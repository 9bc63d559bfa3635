//! Server configuration.

use std::path::PathBuf;

/// Runtime parameters for one server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding `data`, `aead`, and `tree`.
    pub root: PathBuf,
    /// TCP listen port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./sv_root/"),
            port: bv_wire::DEFAULT_PORT,
        }
    }
}
