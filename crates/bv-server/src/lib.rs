//! # BlockVault Server
//!
//! The storage half of BlockVault: a per-server directory holding three
//! flat files —
//!
//! - `data`: one ciphertext slot per block id,
//! - `aead`: one tag ‖ nonce slot per block id,
//! - `tree`: the serialized Merkle tree in level order,
//!
//! — and a session loop that answers the wire protocol over TCP. The
//! server never sees plaintext or keys; its only trusted job is keeping
//! envelopes and the tree consistent, and the client re-verifies every
//! answer against its own persisted root anyway.
//!
//! One connection is served at a time, to completion, before the next is
//! accepted. The in-memory tree is persisted at session end; a crash
//! between envelope writes and tree persistence is healed at next startup
//! by rebuilding the leaves from the on-disk envelopes.

pub mod config;
pub mod errors;
pub mod session;
pub mod store;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use session::{run_session, serve};
pub use store::BlockStore;
