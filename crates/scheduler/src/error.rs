use hypergrid_core::{BlockError, CodecError};
use thiserror::Error;

use crate::job::{Job, JobId};

/// Errors raised by the scheduler context, the partition engine and the
/// merge engine.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("config error: {0}")]
    Config(String),

    #[error("block error: {0}")]
    Block(#[from] BlockError),

    #[error("result for job {0} was already stored")]
    DuplicateResult(JobId),

    #[error("job {id} is outside the leaf range 0..{total}")]
    UnknownJob { id: JobId, total: usize },

    #[error("no result stored for job {0}")]
    MissingResult(JobId),

    #[error("cannot merge with {done} of {total} results")]
    Incomplete { done: usize, total: usize },
}

/// Returned by [`JobQueue::try_push`](crate::JobQueue::try_push) with the
/// rejected job, so the caller can retry it.
#[derive(Debug, Error)]
#[error("job queue is full (job {})", .0.id)]
pub struct QueueFull(pub Job);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("connection closed")]
    Closed,
}

/// Reasons a worker session ends early. All of them are local to the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("worker disconnected")]
    Disconnected,

    #[error("unexpected message while {state}: {preview:?}")]
    UnexpectedMessage { state: &'static str, preview: String },

    #[error("malformed result for job {job}: {source}")]
    Malformed {
        job: JobId,
        #[source]
        source: CodecError,
    },

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Failures on the worker side of the protocol.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("server closed the connection")]
    ServerClosed,

    #[error("bad job payload: {0}")]
    Codec(#[from] CodecError),

    #[error("kernel failed: {0}")]
    Kernel(#[from] BlockError),

    #[error("unexpected reply: {0:?}")]
    UnexpectedReply(String),
}
