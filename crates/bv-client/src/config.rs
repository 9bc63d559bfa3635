//! Client configuration.

use std::path::PathBuf;

/// Runtime parameters for one client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address.
    pub host: String,
    /// Server port (fixed by the protocol; overridable for tests).
    pub port: u16,
    /// Directory holding the client's local files (the `hash` anchor).
    pub root: PathBuf,
    /// Password the session key is derived from.
    pub password: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: bv_wire::DEFAULT_PORT,
            root: PathBuf::from("./cl_root/"),
            password: String::new(),
        }
    }
}
