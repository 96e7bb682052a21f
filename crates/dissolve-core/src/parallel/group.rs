/// A contiguous slice of a pool's processes. The first member leads the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGroup {
    index: usize,
    pool_ranks: Vec<usize>,
    world_ranks: Vec<usize>,
}

impl ProcessGroup {
    pub(crate) fn new(index: usize, pool_ranks: Vec<usize>, world_ranks: Vec<usize>) -> Self {
        debug_assert_eq!(pool_ranks.len(), world_ranks.len());
        Self {
            index,
            pool_ranks,
            world_ranks,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pool_ranks(&self) -> &[usize] {
        &self.pool_ranks
    }

    pub fn world_ranks(&self) -> &[usize] {
        &self.world_ranks
    }

    pub fn n_processes(&self) -> usize {
        self.pool_ranks.len()
    }

    /// Pool rank of the group leader.
    pub fn leader(&self) -> Option<usize> {
        self.pool_ranks.first().copied()
    }

    /// Rank within the group of the given pool rank.
    pub fn position(&self, pool_rank: usize) -> Option<usize> {
        self.pool_ranks.iter().position(|&r| r == pool_rank)
    }
}
