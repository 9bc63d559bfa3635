//! # Verified Block Transport
//!
//! Issues wire-protocol requests over a blocking TCP stream, seals and
//! opens envelopes, and verifies every authentication path against the
//! top hash persisted in the client root. The persisted hash is the only
//! trust anchor: a server answer that does not fold to it is a fatal
//! integrity violation, and the hash file is never touched by a failed
//! read.
//!
//! The kernel binding dispatches sequentially, so every call here is one
//! complete request/response round trip on the wire.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use bv_merkle::PathFolder;
use bv_wire::{Opcode, WireError};
use shared_crypto::{envelope_digest, open_block, seal_block, SecretKey, SessionNonce};
use shared_types::envelope::ENVELOPE_LEN;
use shared_types::{BlockBuf, BlockEnvelope, BlockId, Hash, HASH_LEN, MERKLE_DEPTH};
use tracing::debug;

use crate::ports::BlockTransport;
use crate::TransportError;

/// The single persisted hash representing the trusted Merkle root.
///
/// Replaced by write-temp-then-rename so a crash never leaves a torn
/// hash on disk.
pub struct TopHashFile {
    path: PathBuf,
}

impl TopHashFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the trusted root.
    pub fn load(&self) -> Result<Hash, TransportError> {
        let bytes = std::fs::read(&self.path)?;
        let hash: Hash = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TransportError::TopHashCorrupt(bytes.len()))?;
        Ok(hash)
    }

    /// Atomically replace the trusted root.
    pub fn store(&self, hash: &Hash) -> Result<(), TransportError> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&tmp)?;
            file.write_all(hash)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Blocking wire-protocol transport with per-block verification.
pub struct Transport {
    stream: TcpStream,
    key: SecretKey,
    nonce: SessionNonce,
    top_hash: TopHashFile,
}

impl Transport {
    /// Wrap an established connection with this session's key material
    /// and trust anchor.
    pub fn new(stream: TcpStream, key: SecretKey, nonce: SessionNonce, top_hash: TopHashFile) -> Self {
        Self {
            stream,
            key,
            nonce,
            top_hash,
        }
    }

    /// Connect to the server.
    pub fn connect(host: &str, port: u16) -> Result<TcpStream, TransportError> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Ask the server for its current root (SYNC).
    pub fn sync_root(&mut self) -> Result<Hash, TransportError> {
        self.stream.write_all(&[Opcode::Sync as u8])?;

        let mut root = [0u8; HASH_LEN];
        self.stream.read_exact(&mut root)?;
        Ok(root)
    }

    /// Adopt the server's current root as the trust anchor.
    ///
    /// Only valid on a fresh client root (trust on first use); afterwards
    /// the persisted hash is authoritative.
    pub fn adopt_server_root(&mut self) -> Result<(), TransportError> {
        let root = self.sync_root()?;
        self.top_hash.store(&root)?;
        debug!("[client] adopted server root {}", hex::encode(&root[..8]));
        Ok(())
    }

    /// Read the D siblings of an authentication path, folding as they
    /// arrive.
    fn fold_auth_path(&mut self, id: BlockId, leaf: Hash) -> Result<Hash, TransportError> {
        let mut folder = PathFolder::new(MERKLE_DEPTH, id, leaf);
        for _ in 0..MERKLE_DEPTH {
            let mut sibling = [0u8; HASH_LEN];
            self.stream.read_exact(&mut sibling)?;
            folder.absorb(&sibling);
        }
        Ok(folder.finish())
    }
}

impl BlockTransport for Transport {
    fn read_block(&mut self, id: BlockId, out: &mut BlockBuf) -> Result<(), TransportError> {
        let mut request = Vec::with_capacity(1 + bv_wire::ID_LEN);
        request.push(Opcode::Read as u8);
        request.extend_from_slice(&bv_wire::encode_id(id));
        self.stream.write_all(&request)?;

        let mut op = [0u8; 1];
        self.stream.read_exact(&mut op)?;

        let env = match Opcode::from_u8(op[0])? {
            Opcode::Read => {
                let mut env_bytes = [0u8; ENVELOPE_LEN];
                self.stream.read_exact(&mut env_bytes)?;
                BlockEnvelope::from_bytes(&env_bytes)
            }
            Opcode::NoData => BlockEnvelope::zeroed(),
            _ => return Err(WireError::UnexpectedOpcode(op[0]).into()),
        };

        // Verify before any decryption: the leaf hash covers the envelope
        // exactly as received (the zero envelope for NoData).
        let computed = self.fold_auth_path(id, envelope_digest(&env))?;
        if computed != self.top_hash.load()? {
            return Err(TransportError::IntegrityViolation { id });
        }

        if env.is_zero() {
            out.fill(0);
        } else {
            *out = open_block(&self.key, &env)?;
        }
        Ok(())
    }

    fn write_block(&mut self, id: BlockId, data: &BlockBuf) -> Result<(), TransportError> {
        let env = seal_block(&self.key, &self.nonce, data)?;

        let mut request = Vec::with_capacity(1 + bv_wire::ID_LEN + ENVELOPE_LEN);
        request.push(Opcode::Write as u8);
        request.extend_from_slice(&bv_wire::encode_id(id));
        request.extend_from_slice(&env.to_bytes());
        self.stream.write_all(&request)?;

        // The anchor moves only after the envelope is on the wire; a
        // crash in between surfaces as an integrity error on the next
        // read instead of a silent acceptance.
        let root = self.fold_auth_path(id, envelope_digest(&env))?;
        self.top_hash.store(&root)?;
        Ok(())
    }
}

/// Create the top-hash file for a fresh client root (mode 0600).
pub fn create_top_hash_file(path: &Path) -> Result<TopHashFile, TransportError> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    Ok(TopHashFile::new(path.to_path_buf()))
}
