use super::error::EngineError;
use crate::core::models::configuration::Configuration;
use crate::parallel::pool::ProcessPool;
use crate::parallel::strategy::DivisionStrategy;
use std::collections::BTreeSet;
use tracing::{debug, instrument, trace, warn};

/// Per-cycle claim on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    Unused,
    /// Contains atoms of a molecule owned by the worker.
    LockedForEditing(usize),
    /// Within interaction range of molecules owned by the worker, and of no other worker.
    ReadByOne(usize),
    /// Within interaction range of molecules owned by several workers.
    ReadByMany,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoleculeStatus {
    Waiting,
    Distributed,
}

/// Hands out molecules to concurrent workers so that no two workers edit cells the other
/// reads or edits during the same cycle.
///
/// Every process of the pool runs the same deterministic algorithm over identical input, so
/// all processes agree on the assignment without communicating. Each cycle every worker
/// receives a disjoint set of molecules; a molecule is handed out exactly once across the
/// cycles of a sweep.
///
/// When the requested strategy cannot keep more than one worker busy, the cycle falls back
/// to a single list replicated to every worker and reports [`DivisionStrategy::Pool`] as its
/// current strategy.
#[derive(Debug)]
pub struct RegionalDistributor<'p> {
    pool: &'p ProcessPool,
    original_strategy: DivisionStrategy,
    current_strategy: DivisionStrategy,
    replicated: bool,
    n_workers: usize,
    worker_index: Option<usize>,

    cell_status: Vec<CellStatus>,
    locked_cells: Vec<BTreeSet<usize>>,

    molecule_status: Vec<MoleculeStatus>,
    assigned: Vec<Vec<usize>>,
    n_targets: usize,
    n_distributed: usize,
    n_cycles: usize,
}

impl<'p> RegionalDistributor<'p> {
    pub fn new(
        pool: &'p ProcessPool,
        configuration: &Configuration,
        strategy: DivisionStrategy,
    ) -> Self {
        if strategy == DivisionStrategy::GroupProcesses {
            warn!(
                "Distributing over group processes gives every group the same molecules; \
                 prefer the Groups strategy."
            );
        }
        let n_workers = pool.strategy_n_divisions(strategy).max(1);
        let n_molecules = configuration.n_molecules();
        Self {
            pool,
            original_strategy: strategy,
            current_strategy: strategy,
            replicated: false,
            n_workers,
            worker_index: pool.strategy_process_index(strategy),
            cell_status: vec![CellStatus::Unused; configuration.cells().n_cells()],
            locked_cells: vec![BTreeSet::new(); n_workers],
            molecule_status: vec![MoleculeStatus::Waiting; n_molecules],
            assigned: vec![Vec::new(); n_workers],
            n_targets: n_molecules,
            n_distributed: 0,
            n_cycles: 0,
        }
    }

    /// Restricts distribution to `indices`. Every other molecule counts as already handled.
    ///
    /// Duplicate indices are counted once; indices beyond the molecule count are ignored.
    pub fn set_target_molecules(&mut self, indices: &[usize]) {
        self.molecule_status.fill(MoleculeStatus::Distributed);
        let mut n_targets = 0;
        for &index in indices {
            match self.molecule_status.get_mut(index) {
                Some(status @ MoleculeStatus::Distributed) => {
                    *status = MoleculeStatus::Waiting;
                    n_targets += 1;
                }
                Some(MoleculeStatus::Waiting) => {}
                None => warn!(index, "Ignoring target molecule outside the configuration."),
            }
        }
        self.n_targets = n_targets;
        self.n_distributed = 0;
    }

    fn set_worker_limits(&mut self, strategy: DivisionStrategy) {
        self.n_workers = self.pool.strategy_n_divisions(strategy).max(1);
        self.worker_index = self.pool.strategy_process_index(strategy);
    }

    fn check_configuration(&self, configuration: &Configuration) -> Result<(), EngineError> {
        if configuration.n_molecules() != self.molecule_status.len()
            || configuration.cells().n_cells() != self.cell_status.len()
        {
            return Err(EngineError::Internal(format!(
                "distributor was built for {} molecules over {} cells, configuration has {} over {}",
                self.molecule_status.len(),
                self.cell_status.len(),
                configuration.n_molecules(),
                configuration.cells().n_cells()
            )));
        }
        Ok(())
    }

    fn reset_cycle_state(&mut self) {
        self.set_worker_limits(self.original_strategy);
        self.current_strategy = self.original_strategy;
        self.replicated = false;
        self.cell_status.fill(CellStatus::Unused);
        self.locked_cells = vec![BTreeSet::new(); self.n_workers];
        self.assigned = vec![Vec::new(); self.n_workers];
    }

    /// Computes the next distribution of molecules.
    ///
    /// Returns `false` once every target molecule has been distributed. Must be called by
    /// every process of the pool, including those left without molecules.
    #[instrument(skip_all, name = "distributor_cycle", fields(cycle = self.n_cycles + 1))]
    pub fn cycle(&mut self, configuration: &Configuration) -> Result<bool, EngineError> {
        self.check_configuration(configuration)?;
        if self.n_distributed == self.n_targets {
            debug!("All target molecules distributed.");
            return Ok(false);
        }

        self.reset_cycle_state();

        if self.n_workers == 1 {
            for molecule in 0..self.molecule_status.len() {
                if self.molecule_status[molecule] == MoleculeStatus::Waiting {
                    self.record(molecule, 0);
                }
            }
        } else {
            self.distribute_round_robin(configuration)?;
        }

        self.n_cycles += 1;
        for (worker, molecules) in self.assigned.iter().enumerate() {
            trace!(
                worker,
                n_molecules = molecules.len(),
                n_locked_cells = self.locked_cells.get(worker).map_or(0, BTreeSet::len),
                "Worker assignment."
            );
        }
        debug!(
            n_distributed = self.n_distributed,
            n_targets = self.n_targets,
            strategy = ?self.current_strategy,
            "Distribution cycle complete."
        );
        Ok(true)
    }

    fn distribute_round_robin(&mut self, configuration: &Configuration) -> Result<(), EngineError> {
        let mut exhausted = vec![false; self.n_workers];
        let mut n_exhausted = 0;
        while n_exhausted < self.n_workers {
            for worker in 0..self.n_workers {
                if exhausted[worker] {
                    continue;
                }
                if !self.find_molecule(configuration, worker)? {
                    exhausted[worker] = true;
                    n_exhausted += 1;
                }
            }

            let n_receiving = self.assigned.iter().filter(|list| !list.is_empty()).count();
            if n_receiving <= 1 {
                self.replicate_assignment();
                break;
            }
        }
        Ok(())
    }

    /// Collapses this cycle's work into one list shared by every worker.
    fn replicate_assignment(&mut self) {
        let mut molecules: Vec<usize> = self.assigned.iter().flatten().copied().collect();
        molecules.sort_unstable();
        if molecules.is_empty() {
            // Only molecules without atoms remain, which no cell search can reach.
            for molecule in 0..self.molecule_status.len() {
                if self.molecule_status[molecule] == MoleculeStatus::Waiting {
                    self.molecule_status[molecule] = MoleculeStatus::Distributed;
                    self.n_distributed += 1;
                    molecules.push(molecule);
                }
            }
        }

        self.current_strategy = DivisionStrategy::Pool;
        self.set_worker_limits(DivisionStrategy::Pool);
        self.assigned = vec![molecules; self.n_workers];
        self.locked_cells.resize(self.n_workers, BTreeSet::new());
        self.replicated = true;
        warn!(
            n_molecules = self.assigned[0].len(),
            "Distributor reverted to the pool strategy; every process handles the same molecules."
        );
    }

    /// Searches for a molecule `worker` can take, assigning the first one found.
    fn find_molecule(
        &mut self,
        configuration: &Configuration,
        worker: usize,
    ) -> Result<bool, EngineError> {
        let locked: Vec<usize> = self.locked_cells[worker].iter().copied().collect();
        for cell in locked {
            if self.assign_from_cell(configuration, cell, worker)? {
                return Ok(true);
            }
        }

        let n_cells = self.cell_status.len();
        if !self.locked_cells[worker].is_empty() {
            for cell in 0..n_cells {
                if self.cell_status[cell] == CellStatus::ReadByOne(worker)
                    && self.assign_from_cell(configuration, cell, worker)?
                {
                    return Ok(true);
                }
            }
        }

        let start = (n_cells / self.n_workers) * worker;
        for offset in 0..n_cells {
            let cell = (start + offset) % n_cells;
            if self.cell_status[cell] == CellStatus::Unused
                && self.assign_from_cell(configuration, cell, worker)?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn assign_from_cell(
        &mut self,
        configuration: &Configuration,
        cell: usize,
        worker: usize,
    ) -> Result<bool, EngineError> {
        let mut checked = BTreeSet::new();
        for &atom in configuration.cells().cell(cell).atoms() {
            let molecule = configuration.atom(atom)?.molecule();
            if !checked.insert(molecule) {
                continue;
            }
            if self.assign_molecule(configuration, molecule, worker)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether `worker` may claim `cell` for editing. Unknown cells can never be claimed.
    pub fn can_lock_cell_for_editing(&self, worker: usize, cell: usize) -> bool {
        match self.cell_status.get(cell) {
            Some(CellStatus::Unused) => true,
            Some(CellStatus::LockedForEditing(owner) | CellStatus::ReadByOne(owner)) => {
                *owner == worker
            }
            Some(CellStatus::ReadByMany) | None => false,
        }
    }

    /// Tries to hand `molecule` to `worker`, claiming its cells.
    ///
    /// Either every cell the molecule occupies is locked for `worker` and every neighbouring
    /// cell is marked as read, or nothing changes and `false` is returned.
    pub fn assign_molecule(
        &mut self,
        configuration: &Configuration,
        molecule: usize,
        worker: usize,
    ) -> Result<bool, EngineError> {
        self.check_configuration(configuration)?;
        if worker >= self.n_workers {
            return Err(EngineError::Internal(format!(
                "worker {worker} does not exist among {} workers",
                self.n_workers
            )));
        }
        let atoms = configuration.molecule(molecule)?.atoms();
        if self.molecule_status[molecule] != MoleculeStatus::Waiting || atoms.is_empty() {
            return Ok(false);
        }

        let mut primary = BTreeSet::new();
        for &atom in atoms {
            let cell = configuration.atom(atom)?.cell();
            if self.cell_status[cell] == CellStatus::LockedForEditing(worker) {
                continue;
            }
            if !self.can_lock_cell_for_editing(worker, cell) {
                return Ok(false);
            }
            primary.insert(cell);
        }

        let cells = configuration.cells();
        let mut secondary = BTreeSet::new();
        for &atom in atoms {
            let cell = configuration.atom(atom)?.cell();
            for neighbour in cells.neighbours(cell) {
                match self.cell_status[neighbour] {
                    CellStatus::LockedForEditing(owner) if owner == worker => {}
                    CellStatus::LockedForEditing(_) => return Ok(false),
                    _ => {
                        secondary.insert(neighbour);
                    }
                }
            }
        }

        for &cell in &primary {
            self.cell_status[cell] = CellStatus::LockedForEditing(worker);
            self.locked_cells[worker].insert(cell);
        }
        for &cell in &secondary {
            self.cell_status[cell] = match self.cell_status[cell] {
                CellStatus::Unused => CellStatus::ReadByOne(worker),
                CellStatus::ReadByOne(owner) if owner != worker => CellStatus::ReadByMany,
                unchanged => unchanged,
            };
        }

        self.record(molecule, worker);
        trace!(molecule, worker, "Molecule assigned.");
        Ok(true)
    }

    fn record(&mut self, molecule: usize, worker: usize) {
        self.molecule_status[molecule] = MoleculeStatus::Distributed;
        self.assigned[worker].push(molecule);
        self.n_distributed += 1;
    }

    /// Molecules this process must handle in the current cycle.
    pub fn assigned_molecules(&self) -> &[usize] {
        self.worker_index
            .and_then(|worker| self.assigned.get(worker))
            .map_or(&[], Vec::as_slice)
    }

    /// Molecules handed to `worker` in the current cycle.
    pub fn worker_molecules(&self, worker: usize) -> &[usize] {
        self.assigned.get(worker).map_or(&[], Vec::as_slice)
    }

    /// The strategy in effect for the current cycle.
    pub fn current_strategy(&self) -> DivisionStrategy {
        self.current_strategy
    }

    /// True when the current cycle hands the same molecule list to every worker.
    pub fn is_replicated(&self) -> bool {
        self.replicated || self.n_workers == 1
    }

    /// The strategy whose communicator spans exactly the processes working through the same
    /// molecule list this cycle, so that they can share one random stream.
    pub fn lockstep_strategy(&self) -> DivisionStrategy {
        if self.is_replicated() {
            return DivisionStrategy::PoolProcesses;
        }
        match self.current_strategy {
            DivisionStrategy::Groups => DivisionStrategy::GroupProcesses,
            _ => DivisionStrategy::Pool,
        }
    }

    /// Whether this process should accumulate statistics, so that sums over the pool do not
    /// double count molecules handled by several processes.
    pub fn collect_statistics(&self) -> bool {
        self.current_strategy == DivisionStrategy::Pool || self.pool.is_master()
    }

    /// Whether this process is the single representative of its molecule list this cycle.
    ///
    /// Summing counts from representatives only over the whole pool counts every molecule
    /// exactly once, whatever the strategy.
    pub fn owns_statistics(&self) -> bool {
        if self.is_replicated() {
            return self.pool.is_master();
        }
        match self.current_strategy {
            DivisionStrategy::Groups => self.pool.is_group_leader(),
            DivisionStrategy::GroupProcesses => self.pool.group_index() == 0,
            DivisionStrategy::Pool => self.pool.involves_me(),
            DivisionStrategy::PoolProcesses => self.pool.is_master(),
        }
    }

    pub fn increment(&self, counter: &mut usize) {
        if self.collect_statistics() {
            *counter += 1;
        }
    }

    pub fn increase(&self, total: &mut f64, value: f64) {
        if self.collect_statistics() {
            *total += value;
        }
    }

    pub fn cell_status(&self, cell: usize) -> Option<CellStatus> {
        self.cell_status.get(cell).copied()
    }

    pub fn locked_cells(&self, worker: usize) -> Option<&BTreeSet<usize>> {
        self.locked_cells.get(worker)
    }

    pub fn molecule_status(&self, molecule: usize) -> Option<MoleculeStatus> {
        self.molecule_status.get(molecule).copied()
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    pub fn worker_index(&self) -> Option<usize> {
        self.worker_index
    }

    pub fn n_targets(&self) -> usize {
        self.n_targets
    }

    pub fn n_distributed(&self) -> usize {
        self.n_distributed
    }

    pub fn n_cycles(&self) -> usize {
        self.n_cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spatial::simulation_box::SimulationBox;
    use crate::parallel::testing::spawn_pool;
    use crate::parallel::world::World;
    use nalgebra::Point3;
    use std::collections::HashMap;

    fn cube(length: f64) -> Configuration {
        let b = SimulationBox::cubic(length).unwrap();
        Configuration::new(&b, 5.0, 9.0).unwrap()
    }

    /// Two-atom molecules on a regular lattice with `per_side` sites along each axis.
    fn lattice(length: f64, per_side: usize) -> Configuration {
        let mut config = cube(length);
        let spacing = length / per_side as f64;
        for i in 0..per_side {
            for j in 0..per_side {
                for k in 0..per_side {
                    let r = Point3::new(i as f64, j as f64, k as f64) * spacing
                        + nalgebra::Vector3::repeat(1.0);
                    config.add_molecule(&[r, r + nalgebra::Vector3::new(1.0, 0.0, 0.0)]);
                }
            }
        }
        config
    }

    #[derive(Debug, Clone, PartialEq)]
    struct CycleRecord {
        lists: Vec<Vec<usize>>,
        strategy: DivisionStrategy,
        replicated: bool,
    }

    /// Runs a full sweep, checking cell claims after every cycle.
    fn sweep(distributor: &mut RegionalDistributor, config: &Configuration) -> Vec<CycleRecord> {
        let mut records = Vec::new();
        while distributor.cycle(config).unwrap() {
            assert_claims_consistent(distributor, config);
            records.push(CycleRecord {
                lists: (0..distributor.n_workers())
                    .map(|w| distributor.worker_molecules(w).to_vec())
                    .collect(),
                strategy: distributor.current_strategy(),
                replicated: distributor.is_replicated(),
            });
            assert!(records.len() <= config.n_molecules() + 1, "sweep does not terminate");
        }
        records
    }

    fn assert_claims_consistent(distributor: &RegionalDistributor, config: &Configuration) {
        let cells = config.cells();
        let mut owner = HashMap::new();
        for worker in 0..distributor.n_workers() {
            for &cell in distributor.locked_cells(worker).into_iter().flatten() {
                assert_eq!(
                    distributor.cell_status(cell),
                    Some(CellStatus::LockedForEditing(worker))
                );
                assert!(owner.insert(cell, worker).is_none());
            }
        }
        for (&cell, &worker) in &owner {
            for neighbour in cells.neighbours(cell) {
                if let Some(&other) = owner.get(&neighbour) {
                    assert_eq!(other, worker, "cells {cell} and {neighbour} edited by two workers");
                }
            }
        }
        if !distributor.is_replicated() {
            for worker in 0..distributor.n_workers() {
                for &molecule in distributor.worker_molecules(worker) {
                    for &atom in config.molecule(molecule).unwrap().atoms() {
                        let cell = config.atom(atom).unwrap().cell();
                        assert_eq!(owner.get(&cell), Some(&worker));
                    }
                }
            }
        }
    }

    fn assert_exact_coverage(records: &[CycleRecord], targets: &[usize]) {
        let mut seen = Vec::new();
        for record in records {
            if record.replicated {
                assert!(record.lists.iter().all(|l| *l == record.lists[0]));
                seen.extend(&record.lists[0]);
            } else {
                seen.extend(record.lists.iter().flatten());
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, targets);
    }

    #[test]
    fn single_worker_takes_everything_in_one_cycle() {
        let pool = ProcessPool::set_up("solo", World::solo(), vec![0]).unwrap();
        let config = lattice(30.0, 2);
        let mut distributor = RegionalDistributor::new(&pool, &config, pool.best_strategy());
        assert_eq!(distributor.n_workers(), 1);
        assert!(distributor.cycle(&config).unwrap());
        assert_eq!(distributor.assigned_molecules(), (0..8).collect::<Vec<_>>());
        assert!(distributor.collect_statistics());
        assert!(distributor.owns_statistics());
        assert!(!distributor.cycle(&config).unwrap());
        assert_eq!(distributor.n_cycles(), 1);
    }

    #[test]
    fn shared_cell_leaves_second_molecule_waiting() {
        let results = spawn_pool(2, |pool| {
            let mut config = cube(30.0);
            config.add_molecule(&[Point3::new(1.0, 1.0, 1.0)]);
            config.add_molecule(&[Point3::new(2.0, 2.0, 2.0)]);
            let mut distributor = RegionalDistributor::new(&pool, &config, DivisionStrategy::Pool);
            assert_eq!(distributor.n_workers(), 2);

            assert!(distributor.cycle(&config).unwrap());
            assert_eq!(distributor.assigned_molecules(), &[0]);
            assert_eq!(distributor.current_strategy(), DivisionStrategy::Pool);
            assert!(distributor.is_replicated());
            assert_eq!(distributor.cell_status(0), Some(CellStatus::LockedForEditing(0)));
            assert_eq!(distributor.molecule_status(1), Some(MoleculeStatus::Waiting));

            assert!(distributor.cycle(&config).unwrap());
            assert_eq!(distributor.assigned_molecules(), &[1]);
            assert!(!distributor.cycle(&config).unwrap());
            (distributor.n_cycles(), distributor.owns_statistics())
        });
        assert_eq!(results, vec![(2, true), (2, false)]);
    }

    #[test]
    fn lock_rules_follow_cell_status() {
        let pool = ProcessPool::set_up("solo", World::solo(), vec![0]).unwrap();
        let config = cube(30.0);
        let mut distributor = RegionalDistributor::new(&pool, &config, DivisionStrategy::Pool);
        distributor.cell_status[0] = CellStatus::LockedForEditing(1);
        distributor.cell_status[1] = CellStatus::ReadByOne(0);
        distributor.cell_status[2] = CellStatus::ReadByMany;
        assert!(!distributor.can_lock_cell_for_editing(0, 0));
        assert!(distributor.can_lock_cell_for_editing(1, 0));
        assert!(distributor.can_lock_cell_for_editing(0, 1));
        assert!(!distributor.can_lock_cell_for_editing(1, 1));
        assert!(!distributor.can_lock_cell_for_editing(0, 2));
        assert!(distributor.can_lock_cell_for_editing(1, 3));
    }

    #[test]
    fn rejected_assignment_leaves_state_untouched() {
        let results = spawn_pool(2, |pool| {
            let mut config = cube(30.0);
            config.add_molecule(&[Point3::new(1.0, 1.0, 1.0)]);
            // Second atom sits two cells away, inside the read region of the first molecule.
            config.add_molecule(&[Point3::new(11.0, 1.0, 1.0), Point3::new(16.0, 1.0, 1.0)]);
            let mut distributor = RegionalDistributor::new(&pool, &config, DivisionStrategy::Pool);
            assert!(distributor.assign_molecule(&config, 0, 0).unwrap());
            let before = distributor.cell_status.clone();
            assert!(!distributor.assign_molecule(&config, 1, 1).unwrap());
            assert_eq!(distributor.cell_status, before);
            assert_eq!(distributor.molecule_status(1), Some(MoleculeStatus::Waiting));
            // The owner of the read region may extend its lock.
            assert!(distributor.assign_molecule(&config, 1, 0).unwrap());
            let far = config.cells().cell_index_for(&Point3::new(16.0, 1.0, 1.0));
            distributor.cell_status(far)
        });
        assert!(
            results
                .iter()
                .all(|s| matches!(s, Some(CellStatus::LockedForEditing(0))))
        );
    }

    #[test]
    fn sweep_partitions_molecules_disjointly() {
        let results = spawn_pool(4, |pool| {
            let config = lattice(60.0, 4);
            let mut distributor = RegionalDistributor::new(&pool, &config, DivisionStrategy::Pool);
            let records = sweep(&mut distributor, &config);
            assert_exact_coverage(&records, &(0..64).collect::<Vec<_>>());
            records
        });
        assert!(results.iter().all(|r| *r == results[0]));
        assert!(results[0].iter().any(|r| !r.replicated && r.strategy == DivisionStrategy::Pool));
    }

    #[test]
    fn groups_are_the_workers_under_group_strategy() {
        let results = spawn_pool(4, |mut pool| {
            pool.assign_processes_to_groups(2).unwrap();
            let config = lattice(60.0, 3);
            let strategy = pool.best_strategy();
            let mut distributor = RegionalDistributor::new(&pool, &config, strategy);
            assert_eq!(distributor.n_workers(), 2);
            assert!(distributor.cycle(&config).unwrap());
            (
                distributor.assigned_molecules().to_vec(),
                distributor.lockstep_strategy(),
                distributor.owns_statistics(),
            )
        });
        assert_eq!(results[0].0, results[1].0);
        assert_eq!(results[2].0, results[3].0);
        assert_ne!(results[0].0, results[2].0);
        assert_eq!(results[0].1, DivisionStrategy::GroupProcesses);
        let owners: Vec<bool> = results.iter().map(|r| r.2).collect();
        assert_eq!(owners, vec![true, false, true, false]);
    }

    #[test]
    fn target_subset_is_distributed_exactly() {
        let results = spawn_pool(2, |pool| {
            let config = lattice(60.0, 3);
            let mut distributor = RegionalDistributor::new(&pool, &config, DivisionStrategy::Pool);
            distributor.set_target_molecules(&[3, 5, 5, 20, 99]);
            assert_eq!(distributor.n_targets(), 3);
            assert_eq!(distributor.molecule_status(0), Some(MoleculeStatus::Distributed));
            let records = sweep(&mut distributor, &config);
            assert_exact_coverage(&records, &[3, 5, 20]);
            distributor.n_distributed()
        });
        assert_eq!(results, vec![3, 3]);
    }

    #[test]
    fn atomless_molecules_still_terminate() {
        let results = spawn_pool(2, |pool| {
            let mut config = cube(30.0);
            config.add_molecule(&[]);
            config.add_molecule(&[Point3::new(1.0, 1.0, 1.0)]);
            let mut distributor = RegionalDistributor::new(&pool, &config, DivisionStrategy::Pool);
            let records = sweep(&mut distributor, &config);
            assert_exact_coverage(&records, &[0, 1]);
            records.len()
        });
        assert_eq!(results, vec![2, 2]);
    }

    #[test]
    fn single_molecule_sweep_ends_after_one_cycle() {
        let results = spawn_pool(3, |pool| {
            let mut config = cube(30.0);
            config.add_molecule(&[Point3::new(14.0, 14.0, 14.0)]);
            let mut distributor = RegionalDistributor::new(&pool, &config, DivisionStrategy::Pool);
            let records = sweep(&mut distributor, &config);
            (records.len(), distributor.assigned_molecules().to_vec())
        });
        assert!(results.iter().all(|r| *r == (1, vec![0])));
    }

    #[test]
    fn statistics_helpers_respect_collection_rule() {
        let results = spawn_pool(2, |pool| {
            let config = lattice(60.0, 2);
            let mut distributor = RegionalDistributor::new(&pool, &config, DivisionStrategy::Pool);
            distributor.cycle(&config).unwrap();
            let mut counter = 0;
            let mut total = 0.0;
            distributor.increment(&mut counter);
            distributor.increase(&mut total, 2.5);
            (distributor.collect_statistics(), counter, total)
        });
        // Pool strategy collects everywhere, replicated or not.
        assert_eq!(results, vec![(true, 1, 2.5), (true, 1, 2.5)]);
    }

    #[test]
    fn mismatched_configuration_is_rejected() {
        let pool = ProcessPool::set_up("solo", World::solo(), vec![0]).unwrap();
        let config = lattice(30.0, 2);
        let mut distributor = RegionalDistributor::new(&pool, &config, DivisionStrategy::Pool);
        let other = lattice(30.0, 1);
        assert!(matches!(
            distributor.cycle(&other),
            Err(EngineError::Internal(_))
        ));
        assert!(matches!(
            distributor.assign_molecule(&other, 0, 0),
            Err(EngineError::Internal(_))
        ));

        // Same molecule count, different cell grid.
        let coarse = {
            let b = SimulationBox::cubic(30.0).unwrap();
            let mut coarse = Configuration::new(&b, 10.0, 9.0).unwrap();
            for molecule in 0..config.n_molecules() {
                let atoms = config.molecule(molecule).unwrap().atoms();
                let positions: Vec<Point3<f64>> =
                    atoms.iter().map(|&a| *config.atoms()[a].position()).collect();
                coarse.add_molecule(&positions);
            }
            coarse
        };
        assert_eq!(coarse.n_molecules(), config.n_molecules());
        assert!(matches!(
            distributor.assign_molecule(&coarse, 0, 0),
            Err(EngineError::Internal(_))
        ));
        assert_eq!(distributor.molecule_status(0), Some(MoleculeStatus::Waiting));

        let n_cells = config.cells().n_cells();
        assert_eq!(distributor.cell_status(n_cells), None);
        assert!(!distributor.can_lock_cell_for_editing(0, n_cells));
    }
}
