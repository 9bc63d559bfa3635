//! # Session Loop
//!
//! One client at a time: read an opcode, dispatch, reply, repeat until
//! clean EOF. Any framing or I/O error ends the session; the accept loop
//! persists the tree after every session and keeps serving.

use shared_types::envelope::ENVELOPE_LEN;
use shared_types::{BlockEnvelope, BlockId, BLOCK_COUNT};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{error, info};

use bv_wire::{Opcode, WireError, ID_LEN};

use crate::{BlockStore, ServerError};

/// Accept loop: serve one connection to completion, persist the tree,
/// accept the next. Runs until the listener fails.
pub async fn serve(listener: TcpListener, store: &mut BlockStore) -> Result<(), ServerError> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        info!("[server] client connected: {}", peer);

        match run_session(&mut stream, store).await {
            Ok(()) => info!("[server] client disconnected"),
            Err(e) => error!("[server] session ended with error: {}", e),
        }

        store.persist_tree()?;
    }
}

/// Serve one session over an established stream.
pub async fn run_session<S>(stream: &mut S, store: &mut BlockStore) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let mut op = [0u8; 1];
        match stream.read_exact(&mut op).await {
            Ok(_) => {}
            // EOF on an opcode boundary is the clean end of the session.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        match Opcode::from_u8(op[0])? {
            Opcode::Sync => {
                stream.write_all(&store.root()).await?;
            }
            Opcode::Read => handle_read(stream, store).await?,
            Opcode::Write => handle_write(stream, store).await?,
            Opcode::NoData => return Err(WireError::UnexpectedOpcode(op[0]).into()),
        }
    }
}

async fn read_block_id<S>(stream: &mut S) -> Result<BlockId, ServerError>
where
    S: AsyncRead + Unpin,
{
    let mut id_bytes = [0u8; ID_LEN];
    stream.read_exact(&mut id_bytes).await?;

    let id = bv_wire::decode_id(id_bytes);
    if id >= BLOCK_COUNT {
        return Err(WireError::IdOutOfRange {
            id,
            count: BLOCK_COUNT,
        }
        .into());
    }
    Ok(id)
}

async fn handle_read<S>(stream: &mut S, store: &BlockStore) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = read_block_id(stream).await?;
    let env = store.read_envelope(id)?;
    let path = store.auth_path(id);

    // One buffered reply: opcode, envelope (unless the slot is untouched),
    // then the authentication path.
    let mut reply = Vec::with_capacity(1 + ENVELOPE_LEN + path.len() * 32);
    if env.is_zero() {
        reply.push(Opcode::NoData as u8);
    } else {
        reply.push(Opcode::Read as u8);
        reply.extend_from_slice(&env.to_bytes());
    }
    for sibling in path {
        reply.extend_from_slice(&sibling);
    }

    stream.write_all(&reply).await?;
    Ok(())
}

async fn handle_write<S>(stream: &mut S, store: &mut BlockStore) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = read_block_id(stream).await?;

    let mut env_bytes = [0u8; ENVELOPE_LEN];
    stream.read_exact(&mut env_bytes).await?;
    let env = BlockEnvelope::from_bytes(&env_bytes);

    store.write_envelope(id, &env)?;

    let path = store.auth_path(id);
    let mut reply = Vec::with_capacity(path.len() * 32);
    for sibling in path {
        reply.extend_from_slice(&sibling);
    }
    stream.write_all(&reply).await?;
    Ok(())
}
