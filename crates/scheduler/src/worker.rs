//! Worker side of the protocol: ask for a job, multiply, report, repeat.
//!
//! This is the reference worker. The server never runs it; it drives the
//! in-memory transport in tests and end-to-end runs. Deployed workers are
//! separate processes speaking the same text protocol over a WebSocket.
//!
//! The block product is delegated to a [`BlockKernel`]; [`NaiveKernel`]
//! multiplies in-process.

use hypergrid_core::{codec, Block, BlockError, ControlToken};
use tracing::debug;

use crate::error::WorkerError;
use crate::transport::WorkerTransport;

/// Multiplies one pair of equally sized blocks.
pub trait BlockKernel: Send + Sync {
    fn multiply(&self, a: &Block, b: &Block) -> Result<Block, BlockError>;
}

/// Textbook triple loop.
pub struct NaiveKernel;

impl BlockKernel for NaiveKernel {
    fn multiply(&self, a: &Block, b: &Block) -> Result<Block, BlockError> {
        a.multiply(b)
    }
}

/// Process jobs until the server says `exit`. Returns how many results the
/// worker delivered.
pub async fn run_worker<T, K>(mut transport: T, kernel: &K) -> Result<usize, WorkerError>
where
    T: WorkerTransport,
    K: BlockKernel + ?Sized,
{
    let mut delivered = 0usize;
    loop {
        transport.send(ControlToken::Init.as_str()).await?;
        let message = next(&mut transport).await?;
        if ControlToken::parse(&message) == Some(ControlToken::Exit) {
            return Ok(delivered);
        }

        let (a, b) = codec::decode_job(&message)?;
        let product = kernel.multiply(&a, &b)?;
        transport.send(&codec::encode_block(&product)).await?;
        delivered += 1;

        let reply = next(&mut transport).await?;
        match ControlToken::parse(&reply) {
            Some(ControlToken::Done) => debug!(delivered, "result accepted"),
            Some(ControlToken::Exit) => return Ok(delivered),
            _ => return Err(WorkerError::UnexpectedReply(reply.chars().take(32).collect())),
        }
    }
}

async fn next<T: WorkerTransport>(transport: &mut T) -> Result<String, WorkerError> {
    transport.receive().await?.ok_or(WorkerError::ServerClosed)
}
