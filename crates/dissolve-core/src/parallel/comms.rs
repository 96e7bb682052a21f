use super::error::PoolError;
use super::pool::{CommunicatorType, ProcessPool};
use super::strategy::DivisionStrategy;
use super::transport::Payload;
use nalgebra::Vector3;
use std::ops::AddAssign;

/// Element types that can travel through the pool.
pub trait Transmissible: Copy + Default + Send + 'static {
    const KIND: &'static str;

    fn pack(values: Vec<Self>) -> Payload;
    fn unpack(payload: Payload) -> Result<Vec<Self>, PoolError>;
}

/// Element types supporting element-wise reduction.
pub trait Summable: Transmissible + AddAssign {}

macro_rules! transmissible {
    ($ty:ty, $variant:ident, $kind:literal) => {
        impl Transmissible for $ty {
            const KIND: &'static str = $kind;

            fn pack(values: Vec<Self>) -> Payload {
                Payload::$variant(values)
            }

            fn unpack(payload: Payload) -> Result<Vec<Self>, PoolError> {
                match payload {
                    Payload::$variant(values) => Ok(values),
                    other => Err(PoolError::TypeMismatch {
                        expected: $kind,
                        received: other.kind(),
                    }),
                }
            }
        }
    };
}

transmissible!(i32, Int, "int");
transmissible!(i64, Long, "long");
transmissible!(f64, Double, "double");
transmissible!(bool, Bool, "bool");

impl Summable for i32 {}
impl Summable for i64 {}
impl Summable for f64 {}

fn expect_len<T>(values: Vec<T>, expected: usize) -> Result<Vec<T>, PoolError> {
    if values.len() != expected {
        return Err(PoolError::LengthMismatch {
            expected,
            received: values.len(),
        });
    }
    Ok(values)
}

impl ProcessPool {
    pub fn send<T: Transmissible>(
        &self,
        value: T,
        target: usize,
        comm: CommunicatorType,
    ) -> Result<(), PoolError> {
        self.post(comm, target, T::pack(vec![value]))
    }

    pub fn send_slice<T: Transmissible>(
        &self,
        values: &[T],
        target: usize,
        comm: CommunicatorType,
    ) -> Result<(), PoolError> {
        self.post(comm, target, T::pack(values.to_vec()))
    }

    pub fn receive<T: Transmissible>(
        &self,
        source: usize,
        comm: CommunicatorType,
    ) -> Result<T, PoolError> {
        let values = expect_len(T::unpack(self.fetch(comm, source)?)?, 1)?;
        Ok(values[0])
    }

    /// Receives exactly `buffer.len()` values from `source`.
    pub fn receive_into<T: Transmissible>(
        &self,
        buffer: &mut [T],
        source: usize,
        comm: CommunicatorType,
    ) -> Result<(), PoolError> {
        let values = expect_len(T::unpack(self.fetch(comm, source)?)?, buffer.len())?;
        buffer.copy_from_slice(&values);
        Ok(())
    }

    fn receive_vec<T: Transmissible>(
        &self,
        source: usize,
        comm: CommunicatorType,
    ) -> Result<Vec<T>, PoolError> {
        T::unpack(self.fetch(comm, source)?)
    }

    fn send_to_others(
        &self,
        comm: CommunicatorType,
        root: usize,
        payload: &Payload,
    ) -> Result<(), PoolError> {
        for rank in 0..self.scope_size(comm)? {
            if rank != root {
                self.post(comm, rank, payload.clone())?;
            }
        }
        Ok(())
    }

    pub fn broadcast<T: Transmissible>(
        &self,
        value: &mut T,
        root: usize,
        comm: CommunicatorType,
    ) -> Result<(), PoolError> {
        self.broadcast_slice(std::slice::from_mut(value), root, comm)
    }

    /// Broadcasts a buffer whose length every participant already knows.
    pub fn broadcast_slice<T: Transmissible>(
        &self,
        data: &mut [T],
        root: usize,
        comm: CommunicatorType,
    ) -> Result<(), PoolError> {
        if self.scope_rank(comm)? == root {
            self.send_to_others(comm, root, &T::pack(data.to_vec()))
        } else {
            self.receive_into(data, root, comm)
        }
    }

    /// Broadcasts a buffer of unknown length: the length goes first, then the payload.
    pub fn broadcast_vec<T: Transmissible>(
        &self,
        data: &mut Vec<T>,
        root: usize,
        comm: CommunicatorType,
    ) -> Result<(), PoolError> {
        let mut length = data.len() as i64;
        self.broadcast(&mut length, root, comm)?;
        if self.scope_rank(comm)? != root {
            data.resize(length as usize, T::default());
        }
        self.broadcast_slice(data.as_mut_slice(), root, comm)
    }

    pub fn broadcast_string(
        &self,
        text: &mut String,
        root: usize,
        comm: CommunicatorType,
    ) -> Result<(), PoolError> {
        let mut length = text.len() as i64;
        self.broadcast(&mut length, root, comm)?;
        if self.scope_rank(comm)? == root {
            return self.send_to_others(comm, root, &Payload::Text(text.clone()));
        }
        match self.fetch(comm, root)? {
            Payload::Text(received) if received.len() == length as usize => {
                *text = received;
                Ok(())
            }
            Payload::Text(received) => Err(PoolError::LengthMismatch {
                expected: length as usize,
                received: received.len(),
            }),
            other => Err(PoolError::TypeMismatch {
                expected: "text",
                received: other.kind(),
            }),
        }
    }

    pub fn broadcast_vectors(
        &self,
        data: &mut Vec<Vector3<f64>>,
        root: usize,
        comm: CommunicatorType,
    ) -> Result<(), PoolError> {
        let mut flat: Vec<f64> = data.iter().flat_map(|v| [v.x, v.y, v.z]).collect();
        self.broadcast_vec(&mut flat, root, comm)?;
        if self.scope_rank(comm)? != root {
            *data = flat
                .chunks_exact(3)
                .map(|c| Vector3::new(c[0], c[1], c[2]))
                .collect();
        }
        Ok(())
    }

    /// Element-wise sum of `data` over `comm`, left on `root`. Other ranks keep their input.
    ///
    /// Contributions are accumulated in ascending rank order.
    pub fn sum<T: Summable>(
        &self,
        data: &mut [T],
        root: usize,
        comm: CommunicatorType,
    ) -> Result<(), PoolError> {
        if self.scope_rank(comm)? != root {
            return self.send_slice(data, root, comm);
        }
        let mut total = vec![T::default(); data.len()];
        for rank in 0..self.scope_size(comm)? {
            let contribution = if rank == root {
                data.to_vec()
            } else {
                expect_len(self.receive_vec(rank, comm)?, data.len())?
            };
            for (t, c) in total.iter_mut().zip(contribution) {
                *t += c;
            }
        }
        data.copy_from_slice(&total);
        Ok(())
    }

    /// Element-wise sum of `data` over `comm`, left on every participant.
    pub fn all_sum<T: Summable>(
        &self,
        data: &mut [T],
        comm: CommunicatorType,
    ) -> Result<(), PoolError> {
        self.sum(data, 0, comm)?;
        self.broadcast_slice(data, 0, comm)
    }

    /// Sums over the processes that divided work under `strategy`.
    pub fn all_sum_by_strategy<T: Summable>(
        &self,
        data: &mut [T],
        strategy: DivisionStrategy,
    ) -> Result<(), PoolError> {
        match strategy {
            DivisionStrategy::Groups => {
                if self.is_group_leader() {
                    self.all_sum(data, CommunicatorType::GroupLeaders)?;
                }
                self.broadcast_slice(data, 0, CommunicatorType::GroupProcesses)
            }
            DivisionStrategy::GroupProcesses => {
                self.all_sum(data, CommunicatorType::GroupProcesses)
            }
            DivisionStrategy::Pool => self.all_sum(data, CommunicatorType::PoolProcesses),
            DivisionStrategy::PoolProcesses => {
                self.require_rank()?;
                Ok(())
            }
        }
    }

    pub fn all_sum_vectors(
        &self,
        data: &mut [Vector3<f64>],
        comm: CommunicatorType,
    ) -> Result<(), PoolError> {
        let mut flat: Vec<f64> = data.iter().flat_map(|v| [v.x, v.y, v.z]).collect();
        self.all_sum(&mut flat, comm)?;
        for (v, c) in data.iter_mut().zip(flat.chunks_exact(3)) {
            *v = Vector3::new(c[0], c[1], c[2]);
        }
        Ok(())
    }

    /// Gathers every participant's `local` data into `destination` on `root`, in rank order.
    ///
    /// Returns the number of items written on the root, or the local count elsewhere. The root
    /// drains every contribution before reporting insufficient capacity, so the remaining
    /// ranks stay in step.
    pub fn assemble<T: Transmissible>(
        &self,
        local: &[T],
        destination: &mut [T],
        root: usize,
        comm: CommunicatorType,
    ) -> Result<usize, PoolError> {
        if self.scope_rank(comm)? != root {
            self.send(local.len() as i64, root, comm)?;
            self.send_slice(local, root, comm)?;
            return Ok(local.len());
        }

        let capacity = destination.len();
        let mut needed = 0;
        for rank in 0..self.scope_size(comm)? {
            let contribution = if rank == root {
                local.to_vec()
            } else {
                let count = self.receive::<i64>(rank, comm)? as usize;
                expect_len(self.receive_vec(rank, comm)?, count)?
            };
            let end = needed + contribution.len();
            if end <= capacity {
                destination[needed..end].copy_from_slice(&contribution);
            }
            needed = end;
        }

        if needed > capacity {
            return Err(PoolError::Capacity { needed, capacity });
        }
        Ok(needed)
    }

    /// Called by the deciding rank to tell everyone else the outcome is true.
    pub fn decide_true(&self, root: usize, comm: CommunicatorType) -> Result<(), PoolError> {
        self.broadcast(&mut true, root, comm)
    }

    pub fn decide_false(&self, root: usize, comm: CommunicatorType) -> Result<(), PoolError> {
        self.broadcast(&mut false, root, comm)
    }

    /// Called by every rank other than `root` to learn the decision taken there.
    pub fn decision(&self, root: usize, comm: CommunicatorType) -> Result<bool, PoolError> {
        let mut outcome = false;
        self.broadcast(&mut outcome, root, comm)?;
        Ok(outcome)
    }

    /// True everywhere if every participant passed true.
    pub fn all_true(&self, value: bool, comm: CommunicatorType) -> Result<bool, PoolError> {
        let mut count = [i32::from(value)];
        self.all_sum(&mut count, comm)?;
        Ok(count[0] as usize == self.scope_size(comm)?)
    }

    /// Evaluates `thunk` exactly once, on rank 0 of `comm`, and shares its outcome.
    pub fn run_on_leader_and_broadcast<F>(
        &self,
        comm: CommunicatorType,
        thunk: F,
    ) -> Result<bool, PoolError>
    where
        F: FnOnce() -> bool,
    {
        if self.scope_rank(comm)? == 0 {
            let outcome = thunk();
            if outcome {
                self.decide_true(0, comm)?;
            } else {
                self.decide_false(0, comm)?;
            }
            Ok(outcome)
        } else {
            self.decision(0, comm)
        }
    }

    /// Blocks until every participant of `comm` has arrived.
    pub fn wait(&self, comm: CommunicatorType) -> Result<(), PoolError> {
        if self.all_true(true, comm)? {
            Ok(())
        } else {
            Err(PoolError::Desynchronised(format!(
                "barrier over {comm:?} did not gather every participant"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::testing::spawn_pool;
    use crate::parallel::world::World;
    use std::cell::Cell;

    const POOL: CommunicatorType = CommunicatorType::PoolProcesses;

    fn solo() -> ProcessPool {
        ProcessPool::set_up("solo", World::solo(), vec![0]).unwrap()
    }

    #[test]
    fn single_process_reductions_are_identities() {
        let pool = solo();
        let mut ints = [1, 2, 3];
        pool.all_sum(&mut ints, POOL).unwrap();
        assert_eq!(ints, [1, 2, 3]);
        let mut doubles = [0.5, -1.25];
        pool.sum(&mut doubles, 0, POOL).unwrap();
        assert_eq!(doubles, [0.5, -1.25]);
        for strategy in [
            DivisionStrategy::Groups,
            DivisionStrategy::GroupProcesses,
            DivisionStrategy::Pool,
            DivisionStrategy::PoolProcesses,
        ] {
            let mut longs = [7_i64, 8];
            pool.all_sum_by_strategy(&mut longs, strategy).unwrap();
            assert_eq!(longs, [7, 8]);
        }
    }

    #[test]
    fn single_process_assemble_copies_data() {
        let pool = solo();
        let mut destination = [0.0; 4];
        let n = pool
            .assemble(&[1.0, 2.0, 3.0], &mut destination, 0, POOL)
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(destination, [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(
            pool.assemble(&[1, 2], &mut [0; 1], 0, POOL),
            Err(PoolError::Capacity {
                needed: 2,
                capacity: 1
            })
        );
    }

    #[test]
    fn single_process_decisions_round_trip() {
        let pool = solo();
        pool.decide_true(0, POOL).unwrap();
        pool.decide_false(0, POOL).unwrap();
        assert!(pool.all_true(true, POOL).unwrap());
        assert!(!pool.all_true(false, POOL).unwrap());
        assert!(pool.run_on_leader_and_broadcast(POOL, || true).unwrap());
        pool.wait(POOL).unwrap();
    }

    #[test]
    fn sums_match_across_ranks() {
        let results = spawn_pool(4, |pool| {
            let rank = pool.pool_rank().unwrap();
            let mut data = [rank as i64, 1];
            pool.all_sum(&mut data, POOL).unwrap();
            let mut partial = [rank as f64 * 0.5];
            pool.sum(&mut partial, 2, POOL).unwrap();
            (data, partial[0])
        });
        for (rank, (data, partial)) in results.into_iter().enumerate() {
            assert_eq!(data, [6, 4]);
            let expected = if rank == 2 { 3.0 } else { rank as f64 * 0.5 };
            assert_eq!(partial, expected);
        }
    }

    #[test]
    fn strategy_sums_use_matching_scopes() {
        let results = spawn_pool(4, |mut pool| {
            pool.assign_processes_to_groups(2).unwrap();
            let rank = pool.pool_rank().unwrap() as i32;
            let mut by_groups = [rank];
            let mut by_group_processes = [rank];
            let mut by_pool = [rank];
            let mut untouched = [rank];
            pool.all_sum_by_strategy(&mut by_groups, DivisionStrategy::Groups)
                .unwrap();
            pool.all_sum_by_strategy(&mut by_group_processes, DivisionStrategy::GroupProcesses)
                .unwrap();
            pool.all_sum_by_strategy(&mut by_pool, DivisionStrategy::Pool)
                .unwrap();
            pool.all_sum_by_strategy(&mut untouched, DivisionStrategy::PoolProcesses)
                .unwrap();
            (by_groups[0], by_group_processes[0], by_pool[0], untouched[0])
        });
        // Groups are {0,1} and {2,3}; leaders are ranks 0 and 2.
        assert_eq!(results[0], (2, 1, 6, 0));
        assert_eq!(results[1], (2, 1, 6, 1));
        assert_eq!(results[2], (2, 5, 6, 2));
        assert_eq!(results[3], (2, 5, 6, 3));
    }

    #[test]
    fn broadcasts_resize_receivers() {
        let results = spawn_pool(3, |pool| {
            let root = pool.pool_rank() == Some(1);
            let mut values: Vec<i32> = if root { vec![4, 5, 6, 7] } else { vec![0] };
            pool.broadcast_vec(&mut values, 1, POOL).unwrap();
            let mut text = if root {
                "cell array".to_string()
            } else {
                String::new()
            };
            pool.broadcast_string(&mut text, 1, POOL).unwrap();
            let mut vectors = if root {
                vec![Vector3::new(1.0, 2.0, 3.0)]
            } else {
                Vec::new()
            };
            pool.broadcast_vectors(&mut vectors, 1, POOL).unwrap();
            let mut scalar = if root { 2.5 } else { 0.0 };
            pool.broadcast(&mut scalar, 1, POOL).unwrap();
            (values, text, vectors, scalar)
        });
        for (values, text, vectors, scalar) in results {
            assert_eq!(values, vec![4, 5, 6, 7]);
            assert_eq!(text, "cell array");
            assert_eq!(vectors, vec![Vector3::new(1.0, 2.0, 3.0)]);
            assert_eq!(scalar, 2.5);
        }
    }

    #[test]
    fn assemble_gathers_in_rank_order() {
        let results = spawn_pool(3, |pool| {
            let rank = pool.pool_rank().unwrap() as i32;
            let local: Vec<i32> = (0..=rank).map(|i| rank * 10 + i).collect();
            let mut destination = vec![-1; 6];
            let n = pool.assemble(&local, &mut destination, 0, POOL).unwrap();
            (n, destination)
        });
        assert_eq!(results[0], (6, vec![0, 10, 11, 20, 21, 22]));
        assert_eq!(results[1], (2, vec![-1; 6]));
    }

    #[test]
    fn assemble_reports_insufficient_capacity_on_root() {
        let results = spawn_pool(2, |pool| {
            let mut destination = [0_i64; 2];
            let outcome = pool.assemble(&[1, 2], &mut destination, 0, POOL);
            // The pool is still usable afterwards.
            let mut check = [1];
            pool.all_sum(&mut check, POOL).unwrap();
            (outcome, check[0])
        });
        assert_eq!(
            results[0].0,
            Err(PoolError::Capacity {
                needed: 4,
                capacity: 2
            })
        );
        assert_eq!(results[1].0, Ok(2));
        assert_eq!(results[0].1, 2);
    }

    #[test]
    fn point_to_point_checks_types_and_lengths() {
        let results = spawn_pool(2, |pool| {
            if pool.is_master() {
                pool.send(3_i32, 1, POOL).unwrap();
                pool.send_slice(&[1.0, 2.0], 1, POOL).unwrap();
                pool.send_slice(&[true, false, true], 1, POOL).unwrap();
                None
            } else {
                let value: i32 = pool.receive(0, POOL).unwrap();
                let wrong = pool.receive::<i64>(0, POOL);
                let mut buffer = [false; 2];
                let short = pool.receive_into(&mut buffer, 0, POOL);
                Some((value, wrong, short))
            }
        });
        let (value, wrong, short) = results[1].clone().unwrap();
        assert_eq!(value, 3);
        assert_eq!(
            wrong,
            Err(PoolError::TypeMismatch {
                expected: "long",
                received: "double"
            })
        );
        assert_eq!(
            short,
            Err(PoolError::LengthMismatch {
                expected: 2,
                received: 3
            })
        );
    }

    #[test]
    fn leader_thunk_runs_exactly_once() {
        let results = spawn_pool(3, |pool| {
            let calls = Cell::new(0);
            let outcome = pool
                .run_on_leader_and_broadcast(POOL, || {
                    calls.set(calls.get() + 1);
                    false
                })
                .unwrap();
            let all = pool.all_true(pool.pool_rank() != Some(2), POOL).unwrap();
            (outcome, calls.get(), all)
        });
        assert_eq!(results[0], (false, 1, false));
        assert_eq!(results[1], (false, 0, false));
        assert_eq!(results[2], (false, 0, false));
    }

    #[test]
    fn decisions_reach_followers() {
        let results = spawn_pool(3, |pool| {
            if pool.is_master() {
                pool.decide_true(0, POOL).unwrap();
                pool.decide_false(0, POOL).unwrap();
                (true, false)
            } else {
                (
                    pool.decision(0, POOL).unwrap(),
                    pool.decision(0, POOL).unwrap(),
                )
            }
        });
        assert!(results.iter().all(|&r| r == (true, false)));
    }
}
