//! Strassen work partitioning for remote block workers.
//!
//! A [`Scheduler`] owns the bounded [`JobQueue`] and the [`ResultStore`].
//! The partition engine walks the seven-way recursion tree and enqueues one
//! [`Job`] per block-sized leaf; worker sessions lease jobs and hand back
//! products; the session that stores the last product runs the merge engine,
//! which walks the same tree and recombines the leaves into the final
//! product.

pub mod config;
pub mod context;
pub mod error;
pub mod job;
pub mod merge;
pub mod partition;
pub mod queue;
pub mod results;
pub mod session;
pub mod strassen;
pub mod transport;
pub mod worker;

pub use config::{SchedulerConfig, TreeShape};
pub use context::{LeaseInfo, Progress, Scheduler, SchedulerStatus};
pub use error::{QueueFull, SchedulerError, SessionError, TransportError, WorkerError};
pub use job::{Job, JobId};
pub use merge::LeafSource;
pub use queue::JobQueue;
pub use results::ResultStore;
pub use session::{run_session, SessionOutcome};
pub use transport::{ChannelTransport, WorkerTransport};
pub use worker::{run_worker, BlockKernel, NaiveKernel};
