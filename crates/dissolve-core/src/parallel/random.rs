use super::error::PoolError;
use super::pool::{CommunicatorType, ProcessPool};
use super::strategy::DivisionStrategy;
use rand::prelude::*;
use tracing::trace;

pub const DEFAULT_BUFFER_SIZE: usize = 16172;

/// A buffered stream of uniform random numbers in `[0, 1)`.
///
/// Under lockstep strategies the buffer is filled by the leader of the relevant scope and
/// broadcast, so every process in that scope draws the same sequence. Otherwise each
/// process fills its own buffer from a seed mixed with its world rank.
#[derive(Debug)]
pub struct RandomBuffer<'p> {
    pool: &'p ProcessPool,
    scope: Option<CommunicatorType>,
    rng: StdRng,
    buffer: Vec<f64>,
    index: usize,
}

impl<'p> RandomBuffer<'p> {
    pub fn new(
        pool: &'p ProcessPool,
        strategy: DivisionStrategy,
        seed: u64,
    ) -> Result<Self, PoolError> {
        Self::with_size(pool, strategy, seed, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_size(
        pool: &'p ProcessPool,
        strategy: DivisionStrategy,
        seed: u64,
        size: usize,
    ) -> Result<Self, PoolError> {
        let world_rank = pool.world().rank() as u64;
        let mut buffer = Self {
            pool,
            scope: Self::scope_for(strategy),
            rng: StdRng::seed_from_u64(seed ^ world_rank.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            buffer: vec![0.0; size.max(1)],
            index: 0,
        };
        buffer.refill()?;
        Ok(buffer)
    }

    fn scope_for(strategy: DivisionStrategy) -> Option<CommunicatorType> {
        match strategy {
            DivisionStrategy::PoolProcesses => Some(CommunicatorType::PoolProcesses),
            DivisionStrategy::GroupProcesses => Some(CommunicatorType::GroupProcesses),
            DivisionStrategy::Groups | DivisionStrategy::Pool => None,
        }
    }

    /// The communicator the buffer is shared over, if any.
    pub fn scope(&self) -> Option<CommunicatorType> {
        self.scope
    }

    /// Switches to the scope implied by `strategy` and discards any unused values.
    pub fn reset(&mut self, strategy: DivisionStrategy) -> Result<(), PoolError> {
        self.scope = Self::scope_for(strategy);
        self.refill()
    }

    fn refill(&mut self) -> Result<(), PoolError> {
        match self.scope {
            None => self.fill_locally(),
            Some(comm) => {
                if self.pool.scope_rank(comm)? == 0 {
                    self.fill_locally();
                }
                self.pool.broadcast_slice(&mut self.buffer, 0, comm)?;
            }
        }
        trace!(scope = ?self.scope, size = self.buffer.len(), "Random buffer refilled.");
        self.index = 0;
        Ok(())
    }

    fn fill_locally(&mut self) {
        for value in &mut self.buffer {
            *value = self.rng.r#gen();
        }
    }

    pub fn random(&mut self) -> Result<f64, PoolError> {
        if self.index == self.buffer.len() {
            self.refill()?;
        }
        let value = self.buffer[self.index];
        self.index += 1;
        Ok(value)
    }

    /// A value in `[-1, 1)` drawn from the same stream as [`random`](Self::random).
    pub fn random_plus_minus_one(&mut self) -> Result<f64, PoolError> {
        Ok((self.random()? - 0.5) * 2.0)
    }
}
