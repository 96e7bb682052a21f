use super::error::EngineError;
use crate::core::models::configuration::Configuration;
use crate::core::spatial::error::SpatialError;
use crate::parallel::pool::{CommunicatorType, ProcessPool};
use nalgebra::Point3;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq)]
struct ChangeData {
    atom: usize,
    reference: Point3<f64>,
    moved: bool,
}

impl ChangeData {
    fn snapshot(configuration: &Configuration, atom: usize) -> Result<Self, SpatialError> {
        Ok(Self {
            atom,
            reference: *configuration.atom(atom)?.position(),
            moved: false,
        })
    }
}

/// Records tentative atom moves and shares the accepted ones with every process.
///
/// Targets are registered with [`add_molecule`](Self::add_molecule) or
/// [`add_atom`](Self::add_atom), which snapshot their positions. After a trial move the
/// caller either accepts it with [`update_all`](Self::update_all) or restores the snapshot
/// with [`revert_all`](Self::revert_all). Accepted targets are moved to the pending list by
/// [`store_and_reset`](Self::store_and_reset) and finally applied everywhere by the
/// collective [`distribute_and_apply`](Self::distribute_and_apply).
#[derive(Debug)]
pub struct ChangeStore<'p> {
    pool: &'p ProcessPool,
    targets: Vec<ChangeData>,
    changes: Vec<ChangeData>,
}

impl<'p> ChangeStore<'p> {
    pub fn new(pool: &'p ProcessPool) -> Self {
        Self {
            pool,
            targets: Vec::new(),
            changes: Vec::new(),
        }
    }

    pub fn add_molecule(
        &mut self,
        configuration: &Configuration,
        molecule: usize,
    ) -> Result<(), SpatialError> {
        for &atom in configuration.molecule(molecule)?.atoms() {
            self.targets.push(ChangeData::snapshot(configuration, atom)?);
        }
        Ok(())
    }

    pub fn add_atom(&mut self, configuration: &Configuration, atom: usize) -> Result<(), SpatialError> {
        self.targets.push(ChangeData::snapshot(configuration, atom)?);
        Ok(())
    }

    pub fn n_targets(&self) -> usize {
        self.targets.len()
    }

    /// Number of accepted atom changes waiting to be distributed.
    pub fn n_pending(&self) -> usize {
        self.changes.len()
    }

    /// Accepts the current positions of all targets as their new reference.
    pub fn update_all(&mut self, configuration: &Configuration) -> Result<(), SpatialError> {
        for target in &mut self.targets {
            target.reference = *configuration.atom(target.atom)?.position();
            target.moved = true;
        }
        Ok(())
    }

    /// Restores every target to its reference position.
    pub fn revert_all(&self, configuration: &mut Configuration) -> Result<(), SpatialError> {
        for target in &self.targets {
            configuration.set_atom_position(target.atom, &target.reference)?;
        }
        Ok(())
    }

    /// Moves accepted targets to the pending list and forgets the rest.
    pub fn store_and_reset(&mut self) {
        self.changes
            .extend(self.targets.drain(..).filter(|target| target.moved));
    }

    pub fn reset(&mut self) {
        self.targets.clear();
        self.changes.clear();
    }

    /// Gathers every process's pending changes and applies all of them on every process.
    ///
    /// Collective over the whole pool. Returns the number of atom positions applied, which
    /// is the same on every process. Changes are applied in pool rank order, so an atom
    /// changed by several processes ends up identical everywhere.
    #[instrument(skip_all, name = "distribute_and_apply")]
    pub fn distribute_and_apply(
        &self,
        configuration: &mut Configuration,
    ) -> Result<usize, EngineError> {
        let comm = CommunicatorType::PoolProcesses;

        let mut counts = [self.changes.len() as i64];
        self.pool.all_sum(&mut counts, comm)?;
        let total = counts[0] as usize;

        let local_indices: Vec<i64> = self.changes.iter().map(|c| c.atom as i64).collect();
        let local_positions: Vec<f64> = self
            .changes
            .iter()
            .flat_map(|c| [c.reference.x, c.reference.y, c.reference.z])
            .collect();

        let mut indices = vec![0_i64; total];
        let mut positions = vec![0.0; total * 3];
        self.pool.assemble(&local_indices, &mut indices, 0, comm)?;
        self.pool.assemble(&local_positions, &mut positions, 0, comm)?;
        self.pool.broadcast_slice(&mut indices, 0, comm)?;
        self.pool.broadcast_slice(&mut positions, 0, comm)?;

        for (&atom, r) in indices.iter().zip(positions.chunks_exact(3)) {
            configuration.set_atom_position(atom as usize, &Point3::new(r[0], r[1], r[2]))?;
        }
        debug!(
            local = self.changes.len(),
            total, "Atom changes distributed and applied."
        );
        Ok(total)
    }
}
