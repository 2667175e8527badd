use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Scheduler tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Side length of the leaf blocks handed to workers.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Maximum number of pending jobs held in the queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Push a leased job back onto the queue when its session fails,
    /// instead of stranding it.
    #[serde(default)]
    pub requeue_on_disconnect: bool,
}

fn default_block_size() -> usize { 64 }
fn default_queue_capacity() -> usize { 512 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            queue_capacity: default_queue_capacity(),
            requeue_on_disconnect: false,
        }
    }
}

/// Geometry of one recursion tree: matrix side `side = block_size * 2^depth`
/// and its `7^depth` leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeShape {
    pub side: usize,
    pub block_size: usize,
    pub depth: u32,
    pub leaves: usize,
}

impl SchedulerConfig {
    /// Validate the config against a matrix side length and derive the tree
    /// shape. Rejects sides that are not `block_size * 2^depth`.
    pub fn shape_for(&self, side: usize) -> Result<TreeShape, SchedulerError> {
        if self.block_size == 0 {
            return Err(SchedulerError::Config("block size must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(SchedulerError::Config("queue capacity must be positive".into()));
        }
        if side < self.block_size || side % self.block_size != 0 {
            return Err(SchedulerError::Config(format!(
                "matrix side {side} is not a multiple of block size {}",
                self.block_size
            )));
        }
        let blocks_per_side = side / self.block_size;
        if !blocks_per_side.is_power_of_two() {
            return Err(SchedulerError::Config(format!(
                "matrix side {side} is not block size {} times a power of two",
                self.block_size
            )));
        }
        let depth = blocks_per_side.trailing_zeros();
        let leaves = 7usize.checked_pow(depth).ok_or_else(|| {
            SchedulerError::Config(format!("recursion depth {depth} has too many leaves"))
        })?;
        Ok(TreeShape {
            side,
            block_size: self.block_size,
            depth,
            leaves,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(block_size: usize) -> SchedulerConfig {
        SchedulerConfig {
            block_size,
            ..SchedulerConfig::default()
        }
    }

    #[test]
    fn defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.block_size, 64);
        assert_eq!(config.queue_capacity, 512);
        assert!(!config.requeue_on_disconnect);
    }

    #[test]
    fn shape_counts_leaves() {
        let shape = config(64).shape_for(512).unwrap();
        assert_eq!(shape.depth, 3);
        assert_eq!(shape.leaves, 343);

        let single = config(4).shape_for(4).unwrap();
        assert_eq!(single.depth, 0);
        assert_eq!(single.leaves, 1);
    }

    #[test]
    fn rejects_incompatible_sides() {
        assert!(config(4).shape_for(12).is_err());
        assert!(config(4).shape_for(6).is_err());
        assert!(config(4).shape_for(2).is_err());
        assert!(config(0).shape_for(8).is_err());
    }

    #[test]
    fn rejects_zero_capacity() {
        let config = SchedulerConfig {
            queue_capacity: 0,
            ..config(1)
        };
        assert!(matches!(config.shape_for(2), Err(SchedulerError::Config(_))));
    }

    #[test]
    fn rejects_leaf_count_overflow() {
        let side = 1usize << 40;
        assert!(matches!(config(1).shape_for(side), Err(SchedulerError::Config(_))));
    }
}
