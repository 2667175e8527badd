use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use hypergrid_core::Block;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{SchedulerConfig, TreeShape};
use crate::error::{QueueFull, SchedulerError};
use crate::job::{Job, JobId};
use crate::merge;
use crate::partition;
use crate::queue::JobQueue;
use crate::results::ResultStore;

/// A job currently held by a worker session.
#[derive(Debug, Clone)]
struct Lease {
    job: Job,
    session: Uuid,
    leased_at: DateTime<Utc>,
}

#[derive(Default)]
struct Ledger {
    leases: HashMap<JobId, Lease>,
    /// Leased jobs whose session failed and which were not requeued.
    stranded: BTreeSet<JobId>,
}

/// Result counts after storing one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.done == self.total
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaseInfo {
    pub job_id: JobId,
    pub session: Uuid,
    pub leased_at: DateTime<Utc>,
    pub age_seconds: i64,
}

/// Point-in-time view of a run, served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub shape: TreeShape,
    pub completed: usize,
    pub queued: usize,
    pub queue_capacity: usize,
    pub queue_high_water: usize,
    pub in_flight: Vec<LeaseInfo>,
    pub stranded: Vec<JobId>,
    pub partition_complete: bool,
    pub merged: bool,
    pub stalled: bool,
    pub started_at: DateTime<Utc>,
}

/// Shared state of one distributed multiplication.
///
/// Owns the job queue, the result store and the lease ledger. The partition
/// task and every worker session hold it through an `Arc`.
pub struct Scheduler {
    config: SchedulerConfig,
    shape: TreeShape,
    queue: JobQueue,
    results: ResultStore,
    ledger: Mutex<Ledger>,
    partition_complete: AtomicBool,
    merge_started: AtomicBool,
    product: watch::Sender<Option<Arc<Block>>>,
    started_at: DateTime<Utc>,
}

impl Scheduler {
    /// Create a scheduler for `side x side` operands. Fails when the side is
    /// not `block_size * 2^depth`.
    pub fn new(config: SchedulerConfig, side: usize) -> Result<Self, SchedulerError> {
        let shape = config.shape_for(side)?;
        let (product, _) = watch::channel(None);
        info!(
            side = shape.side,
            block_size = shape.block_size,
            depth = shape.depth,
            leaves = shape.leaves,
            queue_capacity = config.queue_capacity,
            "scheduler ready"
        );
        Ok(Self {
            queue: JobQueue::new(config.queue_capacity),
            results: ResultStore::new(shape.leaves),
            config,
            shape,
            ledger: Mutex::new(Ledger::default()),
            partition_complete: AtomicBool::new(false),
            merge_started: AtomicBool::new(false),
            product,
            started_at: Utc::now(),
        })
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn shape(&self) -> TreeShape {
        self.shape
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Run the partition engine over the full operands. Intended to be the
    /// body of one background task.
    pub async fn run_partition(&self, a: Block, b: Block) -> Result<usize, SchedulerError> {
        if a.side() != self.shape.side {
            return Err(SchedulerError::Config(format!(
                "scheduler was built for side {}, got {}",
                self.shape.side,
                a.side()
            )));
        }
        let emitted = partition::partition(&self.queue, a, b, self.shape.block_size).await?;
        self.partition_complete.store(true, Ordering::SeqCst);
        info!(jobs = emitted, "partition complete");
        Ok(emitted)
    }

    pub fn partition_complete(&self) -> bool {
        self.partition_complete.load(Ordering::SeqCst)
    }

    /// Pop the next job and record it as leased by `session`.
    pub fn lease(&self, session: Uuid) -> Option<Job> {
        // Ledger first, then queue or results: a job is always visible in
        // one of the three to `is_stalled`.
        let mut ledger = self.ledger();
        let job = self.queue.try_pop()?;
        ledger.leases.insert(
            job.id,
            Lease {
                job: job.clone(),
                session,
                leased_at: Utc::now(),
            },
        );
        Some(job)
    }

    /// Store the product of a leased job.
    pub fn complete(&self, id: JobId, block: Block) -> Result<Progress, SchedulerError> {
        let done = {
            let mut ledger = self.ledger();
            ledger.leases.remove(&id);
            self.results.set(id, block)
        };
        let done = match done {
            Ok(done) => done,
            Err(e) => {
                error!(job_id = %id, error = %e, "result store invariant violated");
                return Err(e);
            }
        };
        let progress = Progress {
            done,
            total: self.results.total(),
        };
        info!(job_id = %id, done = progress.done, total = progress.total, "job done");
        Ok(progress)
    }

    /// Release the lease of a job whose session failed. Depending on the
    /// config the job goes back to the queue or is stranded for good.
    pub async fn abandon(&self, id: JobId) {
        let overflow = {
            let mut ledger = self.ledger();
            let Some(lease) = ledger.leases.remove(&id) else {
                return;
            };
            if !self.config.requeue_on_disconnect {
                warn!(
                    job_id = %id,
                    session = %lease.session,
                    "job stranded; the run cannot complete without it"
                );
                ledger.stranded.insert(id);
                return;
            }
            info!(job_id = %id, session = %lease.session, "requeueing abandoned job");
            match self.queue.try_push(lease.job) {
                Ok(()) => return,
                Err(QueueFull(job)) => job,
            }
        };
        self.queue.push(overflow).await;
    }

    /// Run the merge engine once every leaf is stored.
    ///
    /// Only the first successful caller merges; later calls return `Ok(None)`.
    pub fn merge(&self) -> Result<Option<Arc<Block>>, SchedulerError> {
        let done = self.results.done();
        if done != self.results.total() {
            return Err(SchedulerError::Incomplete {
                done,
                total: self.results.total(),
            });
        }
        if self
            .merge_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(None);
        }

        info!(leaves = done, "merging results");
        let block = match merge::merge(&self.results, self.shape.side, self.shape.block_size) {
            Ok(block) => Arc::new(block),
            Err(e) => {
                error!(error = %e, "merge failed");
                self.merge_started.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        self.product.send_replace(Some(Arc::clone(&block)));
        info!(side = block.side(), "product ready");
        Ok(Some(block))
    }

    /// The merged product, once available.
    pub fn product(&self) -> Option<Arc<Block>> {
        self.product.borrow().clone()
    }

    /// Wait until the merge engine has published the product.
    pub async fn wait_for_product(&self) -> Option<Arc<Block>> {
        let mut rx = self.product.subscribe();
        let product = rx.wait_for(Option::is_some).await.ok()?;
        product.clone()
    }

    /// True when the run can no longer finish on its own: every job has left
    /// the queue, no lease is outstanding, and results are still missing.
    pub fn is_stalled(&self) -> bool {
        if !self.partition_complete() {
            return false;
        }
        let ledger = self.ledger();
        ledger.leases.is_empty() && self.queue.is_empty() && !self.results.is_complete()
    }

    pub fn stranded(&self) -> Vec<JobId> {
        self.ledger().stranded.iter().copied().collect()
    }

    /// Leases held for longer than `max_age`, oldest first.
    pub fn overdue_leases(&self, max_age: chrono::Duration) -> Vec<LeaseInfo> {
        let now = Utc::now();
        let mut overdue: Vec<LeaseInfo> = self
            .lease_infos(now)
            .into_iter()
            .filter(|l| now.signed_duration_since(l.leased_at) > max_age)
            .collect();
        overdue.sort_by_key(|l| l.leased_at);
        overdue
    }

    fn lease_infos(&self, now: DateTime<Utc>) -> Vec<LeaseInfo> {
        let ledger = self.ledger();
        let mut infos: Vec<LeaseInfo> = ledger
            .leases
            .iter()
            .map(|(id, lease)| LeaseInfo {
                job_id: *id,
                session: lease.session,
                leased_at: lease.leased_at,
                age_seconds: now.signed_duration_since(lease.leased_at).num_seconds(),
            })
            .collect();
        infos.sort_by_key(|l| l.job_id);
        infos
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            shape: self.shape,
            completed: self.results.done(),
            queued: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            queue_high_water: self.queue.high_water(),
            in_flight: self.lease_infos(Utc::now()),
            stranded: self.stranded(),
            partition_complete: self.partition_complete(),
            merged: self.product().is_some(),
            stalled: self.is_stalled(),
            started_at: self.started_at,
        }
    }
}
