//! Merge engine: walks the recursion tree again and recombines stored leaf
//! products with Strassen's formulas. No multiplication happens here.

use hypergrid_core::Block;

use crate::error::SchedulerError;
use crate::job::JobId;
use crate::results::ResultStore;
use crate::strassen;

/// Where the merge engine reads finished leaves from.
pub trait LeafSource {
    fn leaf(&self, id: JobId) -> Option<Block>;
}

impl LeafSource for ResultStore {
    fn leaf(&self, id: JobId) -> Option<Block> {
        self.get(id)
    }
}

/// Rebuild the `side x side` product from the leaves of a tree whose leaves
/// are `block_size` wide. Every leaf is read exactly once.
pub fn merge<S: LeafSource + ?Sized>(
    source: &S,
    side: usize,
    block_size: usize,
) -> Result<Block, SchedulerError> {
    merge_node(source, JobId::ROOT, side, block_size)
}

fn merge_node<S: LeafSource + ?Sized>(
    source: &S,
    id: JobId,
    side: usize,
    block_size: usize,
) -> Result<Block, SchedulerError> {
    if side == block_size {
        return source.leaf(id).ok_or(SchedulerError::MissingResult(id));
    }
    if side < block_size || side % 2 != 0 {
        return Err(SchedulerError::Config(format!(
            "matrix side is not block size {block_size} times a power of two"
        )));
    }

    let half = side / 2;
    let child = |branch: usize| merge_node(source, id.child(branch), half, block_size);
    let products = [
        child(0)?,
        child(1)?,
        child(2)?,
        child(3)?,
        child(4)?,
        child(5)?,
        child(6)?,
    ];
    Ok(strassen::combine(&products)?)
}
