use std::fmt;
use std::sync::Arc;

use hypergrid_core::{codec, Block};
use serde::{Deserialize, Serialize};

/// Identifier of a node in the Strassen recursion tree.
///
/// The root is 0 and the children of `id` are `id * 7 + k` for branch
/// `k = 0..7`, where branch `k` holds product `p(k+1)`: `p1` is branch 0 and
/// `p7` is branch 6. The base-7 digits of a leaf id therefore
/// spell its path from the root, and the leaves of a depth-`d` tree cover
/// exactly `0..7^d` in depth-first order, so leaf ids double as dense
/// indices into the result store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    pub const ROOT: JobId = JobId(0);

    /// Fan-out of every internal node.
    pub const BRANCHES: usize = 7;

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Child for branch `k` (0-based, `k < 7`).
    pub fn child(self, branch: usize) -> JobId {
        debug_assert!(branch < Self::BRANCHES);
        JobId(self.0 * Self::BRANCHES as u64 + branch as u64)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Slot in the result store.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Product numbers (`1..=7`) from the root down to this node, for a node
    /// `depth` levels below the root.
    pub fn path(self, depth: u32) -> Vec<u8> {
        let mut digits = Vec::with_capacity(depth as usize);
        let mut rest = self.0;
        for _ in 0..depth {
            digits.push((rest % Self::BRANCHES as u64) as u8 + 1);
            rest /= Self::BRANCHES as u64;
        }
        digits.reverse();
        digits
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One leaf multiplication: `a * b` for the leaf `id`.
///
/// The operands sit behind `Arc` so a leased job can be kept for requeueing
/// without copying its blocks.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub a: Arc<Block>,
    pub b: Arc<Block>,
}

impl Job {
    pub fn new(id: JobId, a: Block, b: Block) -> Self {
        Self {
            id,
            a: Arc::new(a),
            b: Arc::new(b),
        }
    }

    /// Wire payload sent to the worker.
    pub fn payload(&self) -> String {
        codec::encode_job(&self.a, &self.b)
    }
}
