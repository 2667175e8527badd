//! Partition engine: walks the recursion tree top-down and enqueues one job
//! per block-sized leaf.
//!
//! The walk is depth-first with an explicit stack. Children are pushed in
//! reverse so `p1` is expanded first, which yields the same leaf order as
//! the plain recursive formulation.

use hypergrid_core::Block;
use tracing::debug;

use crate::error::SchedulerError;
use crate::job::{Job, JobId};
use crate::queue::JobQueue;
use crate::strassen;

struct Frame {
    id: JobId,
    a: Block,
    b: Block,
}

/// Emit every leaf job of `a * b` into `queue`, suspending whenever the queue
/// is full. Returns the number of jobs emitted.
pub async fn partition(
    queue: &JobQueue,
    a: Block,
    b: Block,
    block_size: usize,
) -> Result<usize, SchedulerError> {
    if a.side() != b.side() {
        return Err(SchedulerError::Config(format!(
            "operands differ in size: {} vs {}",
            a.side(),
            b.side()
        )));
    }
    if block_size == 0 || a.side() < block_size {
        return Err(SchedulerError::Config(format!(
            "matrix side {} is smaller than block size {block_size}",
            a.side()
        )));
    }

    let mut stack = vec![Frame {
        id: JobId::ROOT,
        a,
        b,
    }];
    let mut emitted = 0usize;

    while let Some(Frame { id, a, b }) = stack.pop() {
        if a.side() == block_size {
            queue.push(Job::new(id, a, b)).await;
            emitted += 1;
            continue;
        }
        if a.side() < block_size {
            return Err(SchedulerError::Config(format!(
                "matrix side is not block size {block_size} times a power of two"
            )));
        }

        let pairs = strassen::operand_pairs(&a, &b)?;
        for (branch, (left, right)) in pairs.into_iter().enumerate().rev() {
            stack.push(Frame {
                id: id.child(branch),
                a: left,
                b: right,
            });
        }
        debug!(node = %id, side = a.side(), "expanded node");
        // Splitting large operands is CPU work; let sessions run in between.
        tokio::task::yield_now().await;
    }

    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn counting(side: usize) -> Block {
        Block::from_vec(side, (0..side * side).map(|v| v as f64).collect()).unwrap()
    }

    fn drain(queue: &JobQueue) -> Vec<Job> {
        std::iter::from_fn(|| queue.try_pop()).collect()
    }

    #[tokio::test]
    async fn two_by_two_emits_seven_unit_jobs() {
        let queue = JobQueue::new(16);
        let a = Block::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let b = Block::from_rows(&[[5.0, 6.0], [7.0, 8.0]]).unwrap();

        let emitted = partition(&queue, a, b, 1).await.unwrap();
        assert_eq!(emitted, 7);

        let jobs = drain(&queue);
        let ids: Vec<u64> = jobs.iter().map(|j| j.id.get()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6]);

        let operands: Vec<(f64, f64)> = jobs
            .iter()
            .map(|j| (j.a.get(0, 0), j.b.get(0, 0)))
            .collect();
        assert_eq!(
            operands,
            vec![
                (1.0, -2.0),
                (3.0, 8.0),
                (7.0, 5.0),
                (4.0, 2.0),
                (5.0, 13.0),
                (-2.0, 15.0),
                (-2.0, 11.0),
            ]
        );
    }

    #[tokio::test]
    async fn emits_seven_to_the_depth_distinct_leaves() {
        let queue = JobQueue::new(512);
        let emitted = partition(&queue, counting(8), counting(8), 2).await.unwrap();
        assert_eq!(emitted, 49);

        let jobs = drain(&queue);
        let ids: HashSet<JobId> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids.len(), 49);
        assert!(jobs.iter().all(|j| j.id.get() < 49 && j.a.side() == 2 && j.b.side() == 2));
    }

    #[tokio::test]
    async fn single_block_is_one_job() {
        let queue = JobQueue::new(1);
        assert_eq!(partition(&queue, counting(4), counting(4), 4).await.unwrap(), 1);
        assert_eq!(queue.try_pop().unwrap().id, JobId::ROOT);
    }

    #[tokio::test]
    async fn waits_for_room_in_a_small_queue() {
        let queue = JobQueue::new(2);
        let producer = partition(&queue, counting(4), counting(4), 1);
        let consumer = async {
            let mut seen = Vec::new();
            while seen.len() < 49 {
                match queue.try_pop() {
                    Some(job) => seen.push(job.id.get()),
                    None => tokio::task::yield_now().await,
                }
            }
            seen
        };
        let (emitted, seen) = tokio::join!(producer, consumer);
        assert_eq!(emitted.unwrap(), 49);
        assert_eq!(seen, (0..49).collect::<Vec<u64>>());
        assert!(queue.high_water() <= 2);
    }

    #[tokio::test]
    async fn rejects_incompatible_sizes() {
        let queue = JobQueue::new(4);
        assert!(partition(&queue, counting(2), counting(4), 1).await.is_err());
        assert!(partition(&queue, counting(2), counting(2), 4).await.is_err());
        assert!(partition(&queue, counting(6), counting(6), 4).await.is_err());
        assert!(queue.is_empty());
    }
}
