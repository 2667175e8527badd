use std::sync::{Mutex, MutexGuard, PoisonError};

use hypergrid_core::Block;

use crate::error::SchedulerError;
use crate::job::JobId;

struct Slots {
    blocks: Vec<Option<Block>>,
    done: usize,
}

/// Write-once store of leaf products, addressed by leaf id.
///
/// An empty slot means "not computed yet"; a zero block is a real result.
pub struct ResultStore {
    slots: Mutex<Slots>,
    total: usize,
}

impl ResultStore {
    pub fn new(total: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                blocks: vec![None; total],
                done: 0,
            }),
            total,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the product for `id` and return the number of stored results.
    ///
    /// Storing twice for one id is an invariant violation and is rejected.
    pub fn set(&self, id: JobId, block: Block) -> Result<usize, SchedulerError> {
        let mut slots = self.lock();
        let slot = slots
            .blocks
            .get_mut(id.index())
            .ok_or(SchedulerError::UnknownJob {
                id,
                total: self.total,
            })?;
        if slot.is_some() {
            return Err(SchedulerError::DuplicateResult(id));
        }
        *slot = Some(block);
        slots.done += 1;
        Ok(slots.done)
    }

    pub fn get(&self, id: JobId) -> Option<Block> {
        self.lock().blocks.get(id.index()).cloned().flatten()
    }

    pub fn contains(&self, id: JobId) -> bool {
        matches!(self.lock().blocks.get(id.index()), Some(Some(_)))
    }

    pub fn done(&self) -> usize {
        self.lock().done
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.done() == self.total
    }

    /// Ids that have no result yet, in ascending order.
    pub fn missing(&self) -> Vec<JobId> {
        self.lock()
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| JobId::new(index as u64))
            .collect()
    }
}
