//! # BlockVault Integration Suite
//!
//! Cross-crate scenarios: a real server on an ephemeral port, real TCP
//! sessions, real files on both sides. Per-crate behavior is covered by
//! the unit tests next to the code; this crate only exercises what needs
//! the full stack — protocol round trips, integrity under tampering,
//! persistence across sessions, and cache/filesystem behavior over the
//! wire.

pub mod harness;

#[cfg(test)]
mod scenarios;
