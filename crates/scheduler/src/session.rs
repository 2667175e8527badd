//! Per-connection protocol state machine.
//!
//! ```text
//! AwaitInit --init--> AwaitResult --result--> AwaitInit   (reply "done")
//!     |                    |
//!     | init, empty queue  | result, queue empty or run complete
//!     v                    v
//!   "exit"               "exit" (+ merge when complete)
//! ```
//!
//! Any other message, a malformed result, or a dropped connection ends the
//! session with an error. A job on loan at that point is handed to
//! [`Scheduler::abandon`].

use hypergrid_core::{codec, ControlToken};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::Scheduler;
use crate::error::SessionError;
use crate::job::JobId;
use crate::transport::WorkerTransport;

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The worker asked for work and the queue was empty.
    NoWork { completed: usize },
    /// The queue ran dry after the worker's last result.
    Drained { completed: usize },
    /// This session stored the final result and ran the merge.
    Merged { completed: usize },
}

struct Session<'a, T: WorkerTransport + ?Sized> {
    id: Uuid,
    transport: &'a mut T,
    scheduler: &'a Scheduler,
    loan: Option<JobId>,
    completed: usize,
}

/// Serve one worker connection until it finishes or fails.
pub async fn run_session<T: WorkerTransport + ?Sized>(
    transport: &mut T,
    scheduler: &Scheduler,
    id: Uuid,
) -> Result<SessionOutcome, SessionError> {
    let mut session = Session {
        id,
        transport,
        scheduler,
        loan: None,
        completed: 0,
    };
    let outcome = session.serve().await;
    if let Err(e) = &outcome {
        warn!(session = %id, error = %e, "session failed");
        if let Some(job) = session.loan.take() {
            scheduler.abandon(job).await;
        }
    }
    outcome
}

impl<T: WorkerTransport + ?Sized> Session<'_, T> {
    async fn serve(&mut self) -> Result<SessionOutcome, SessionError> {
        loop {
            let message = self
                .transport
                .receive()
                .await?
                .ok_or(SessionError::Disconnected)?;

            match self.loan {
                None => {
                    if ControlToken::parse(&message) != Some(ControlToken::Init) {
                        return Err(unexpected("awaiting init", &message));
                    }
                    if let Some(outcome) = self.hand_out().await? {
                        return Ok(outcome);
                    }
                }
                Some(job) => {
                    if ControlToken::parse(&message).is_some() {
                        return Err(unexpected("awaiting a result", &message));
                    }
                    if let Some(outcome) = self.accept(job, &message).await? {
                        return Ok(outcome);
                    }
                }
            }
        }
    }

    /// Lease the next job to the worker, or tell it to leave.
    async fn hand_out(&mut self) -> Result<Option<SessionOutcome>, SessionError> {
        let Some(job) = self.scheduler.lease(self.id) else {
            info!(session = %self.id, "no jobs queued; sending exit");
            self.send(ControlToken::Exit.as_str()).await?;
            return Ok(Some(SessionOutcome::NoWork {
                completed: self.completed,
            }));
        };
        debug!(
            session = %self.id,
            job_id = %job.id,
            path = ?job.id.path(self.scheduler.shape().depth),
            "job leased"
        );
        self.loan = Some(job.id);
        self.send(&job.payload()).await?;
        Ok(None)
    }

    /// Store a result for the loaned job and decide what the worker does next.
    async fn accept(
        &mut self,
        job: JobId,
        payload: &str,
    ) -> Result<Option<SessionOutcome>, SessionError> {
        let block = codec::decode_block(payload, self.scheduler.shape().block_size)
            .map_err(|source| SessionError::Malformed { job, source })?;

        self.loan = None;
        let progress = self.scheduler.complete(job, block)?;
        self.completed += 1;

        if progress.is_complete() {
            // Release the worker before publishing: the process may exit as
            // soon as the product is out.
            if let Err(e) = self.send(ControlToken::Exit.as_str()).await {
                debug!(session = %self.id, error = %e, "final exit not delivered");
            }
            self.scheduler.merge()?;
            return Ok(Some(SessionOutcome::Merged {
                completed: self.completed,
            }));
        }
        if self.scheduler.queue().is_empty() {
            info!(session = %self.id, "queue empty; sending exit");
            self.send(ControlToken::Exit.as_str()).await?;
            return Ok(Some(SessionOutcome::Drained {
                completed: self.completed,
            }));
        }
        self.send(ControlToken::Done.as_str()).await?;
        Ok(None)
    }

    async fn send(&mut self, message: &str) -> Result<(), SessionError> {
        Ok(self.transport.send(message).await?)
    }
}

fn unexpected(state: &'static str, message: &str) -> SessionError {
    SessionError::UnexpectedMessage {
        state,
        preview: message.chars().take(32).collect(),
    }
}
