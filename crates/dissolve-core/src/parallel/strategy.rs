use super::pool::ProcessPool;
use serde::Deserialize;
use std::iter::StepBy;
use std::ops::Range;
use tracing::warn;

/// How a set of work items is split across the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DivisionStrategy {
    /// One partition per process group.
    Groups,
    /// One partition per process within this process's group.
    GroupProcesses,
    /// One partition per process in the pool.
    Pool,
    /// A single partition shared by the whole pool.
    PoolProcesses,
}

impl ProcessPool {
    /// The strategy that divides the work of one partition of `strategy` further.
    pub fn sub_division_strategy(strategy: DivisionStrategy) -> DivisionStrategy {
        match strategy {
            DivisionStrategy::Groups => DivisionStrategy::GroupProcesses,
            DivisionStrategy::Pool => DivisionStrategy::PoolProcesses,
            other => {
                warn!(?other, "Strategy cannot be subdivided further.");
                other
            }
        }
    }

    /// Groups when there are more processes than groups, otherwise the whole pool.
    pub fn best_strategy(&self) -> DivisionStrategy {
        if self.pool_size() > self.max_process_groups() {
            DivisionStrategy::Groups
        } else {
            DivisionStrategy::Pool
        }
    }

    pub fn strategy_n_divisions(&self, strategy: DivisionStrategy) -> usize {
        match strategy {
            DivisionStrategy::Groups => self.n_groups(),
            DivisionStrategy::GroupProcesses => self.group_size(),
            DivisionStrategy::Pool => self.pool_size(),
            DivisionStrategy::PoolProcesses => 1,
        }
    }

    /// The partition owned by this process, or `None` outside the pool.
    pub fn strategy_process_index(&self, strategy: DivisionStrategy) -> Option<usize> {
        let pool_rank = self.pool_rank()?;
        Some(match strategy {
            DivisionStrategy::Groups => self.group_index(),
            DivisionStrategy::GroupProcesses => self.group_rank(),
            DivisionStrategy::Pool => pool_rank,
            DivisionStrategy::PoolProcesses => 0,
        })
    }

    pub fn interleaved_loop_start(&self, strategy: DivisionStrategy) -> Option<usize> {
        self.strategy_process_index(strategy)
    }

    pub fn interleaved_loop_stride(&self, strategy: DivisionStrategy) -> usize {
        self.strategy_n_divisions(strategy)
    }

    /// The indices `0..n_items` owned by this process under interleaved striping.
    pub fn interleaved_indices(
        &self,
        strategy: DivisionStrategy,
        n_items: usize,
    ) -> StepBy<Range<usize>> {
        let start = self.interleaved_loop_start(strategy).unwrap_or(n_items);
        (start..n_items).step_by(self.interleaved_loop_stride(strategy).max(1))
    }

    /// Exclusive end of the triangular wedge owned by process `k` of `n`.
    fn two_body_boundary(k: usize, n: usize, n_items: usize) -> usize {
        if k + 1 >= n {
            return n_items;
        }
        let remaining = (1.0 - (k + 1) as f64 / n as f64).max(0.0);
        let end = ((1.0 - remaining.sqrt()) * n_items as f64) as usize;
        end.min(n_items)
    }

    /// Rows of an upper-triangular `i <= j < n_items` loop owned by this process.
    ///
    /// Each process receives an equal share of the triangle's area rather than an equal
    /// number of rows.
    pub fn two_body_loop_range(&self, n_items: usize) -> Range<usize> {
        let Some(rank) = self.pool_rank() else {
            return 0..0;
        };
        let n = self.pool_size();
        let start = if rank == 0 {
            0
        } else {
            Self::two_body_boundary(rank - 1, n, n_items)
        };
        start..Self::two_body_boundary(rank, n, n_items).max(start)
    }

    pub fn two_body_loop_start(&self, n_items: usize) -> usize {
        self.two_body_loop_range(n_items).start
    }

    /// Exclusive end of this process's rows.
    pub fn two_body_loop_end(&self, n_items: usize) -> usize {
        self.two_body_loop_range(n_items).end
    }
}
