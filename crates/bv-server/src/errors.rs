//! Server error types.

use thiserror::Error;

/// Errors from the store or a session. Every variant ends the session;
/// the accept loop keeps running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Local file or socket I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol violation by the peer
    #[error("Protocol error: {0}")]
    Wire(#[from] bv_wire::WireError),

    /// Persisted tree could not be parsed
    #[error("Tree file error: {0}")]
    Merkle(#[from] bv_merkle::MerkleError),
}
