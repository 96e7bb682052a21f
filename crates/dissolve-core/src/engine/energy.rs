use super::error::EngineError;
use crate::core::forcefield::potentials::PairPotential;
use crate::core::models::configuration::Configuration;
use crate::core::spatial::cell_array::CellPair;
use crate::core::spatial::error::SpatialError;
use crate::parallel::pool::{CommunicatorType, ProcessPool};
use crate::parallel::strategy::DivisionStrategy;
use itertools::iproduct;
use tracing::instrument;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Intermolecular pair energies of a configuration, evaluated through its cell lists.
///
/// Pairs of atoms within one molecule are excluded, as are pairs separated by more than the
/// cell array's cutoff.
pub struct EnergyKernel<'a, P: PairPotential> {
    configuration: &'a Configuration,
    potential: &'a P,
    cutoff: f64,
}

impl<'a, P: PairPotential> EnergyKernel<'a, P> {
    pub fn new(configuration: &'a Configuration, potential: &'a P) -> Self {
        Self {
            configuration,
            potential,
            cutoff: configuration.cells().cutoff(),
        }
    }

    #[inline]
    fn pair_energy(&self, i: usize, j: usize, minimum_image: bool) -> f64 {
        let atoms = self.configuration.atoms();
        if atoms[i].molecule() == atoms[j].molecule() {
            return 0.0;
        }
        let (a, b) = (atoms[i].position(), atoms[j].position());
        let dist = if minimum_image {
            self.configuration.simulation_box().minimum_distance(a, b)
        } else {
            (b - a).norm()
        };
        if dist > self.cutoff {
            0.0
        } else {
            self.potential.energy(dist)
        }
    }

    /// Energy between one molecule and every other atom in range.
    pub fn molecule_energy(&self, molecule: usize) -> Result<f64, SpatialError> {
        let cells = self.configuration.cells();
        let mut total = 0.0;
        for &i in self.configuration.molecule(molecule)?.atoms() {
            let home = cells.cell(self.configuration.atom(i)?.cell());
            total += home
                .atoms()
                .iter()
                .map(|&j| self.pair_energy(i, j, false))
                .sum::<f64>();
            for &neighbour in home.near_neighbours() {
                total += cells
                    .cell(neighbour)
                    .atoms()
                    .iter()
                    .map(|&j| self.pair_energy(i, j, false))
                    .sum::<f64>();
            }
            for &neighbour in home.mim_neighbours() {
                total += cells
                    .cell(neighbour)
                    .atoms()
                    .iter()
                    .map(|&j| self.pair_energy(i, j, true))
                    .sum::<f64>();
            }
        }
        Ok(total)
    }

    fn cell_pair_energy(&self, pair: &CellPair) -> f64 {
        let cells = self.configuration.cells();
        let first = cells.cell(pair.first).atoms();
        if pair.first == pair.second {
            return first
                .iter()
                .enumerate()
                .flat_map(|(n, &i)| first.iter().skip(n + 1).map(move |&j| (i, j)))
                .map(|(i, j)| self.pair_energy(i, j, false))
                .sum();
        }
        let second = cells.cell(pair.second).atoms();
        iproduct!(first.iter(), second.iter())
            .map(|(&i, &j)| self.pair_energy(i, j, pair.minimum_image))
            .sum()
    }

    /// Total intermolecular energy, with cell pairs striped across the processes of
    /// `strategy`. Collective over the processes the strategy divides work between.
    #[instrument(skip_all, name = "total_energy")]
    pub fn total_energy(
        &self,
        pool: &ProcessPool,
        strategy: DivisionStrategy,
    ) -> Result<f64, EngineError> {
        let pairs = self.configuration.cells().neighbour_pairs();
        let mine: Vec<&CellPair> = pool
            .interleaved_indices(strategy, pairs.len())
            .map(|index| &pairs[index])
            .collect();

        #[cfg(not(feature = "parallel"))]
        let iterator = mine.iter();

        #[cfg(feature = "parallel")]
        let iterator = mine.par_iter();

        let local: f64 = iterator.map(|pair| self.cell_pair_energy(pair)).sum();

        let mut total = [local];
        pool.all_sum_by_strategy(&mut total, strategy)?;
        Ok(total[0])
    }

    /// Total intermolecular energy from an explicit loop over all atom pairs under minimum
    /// image, split across the pool in triangular wedges.
    ///
    /// Collective over the whole pool. Mainly useful for validating cell-based sums.
    #[instrument(skip_all, name = "pairwise_total_energy")]
    pub fn pairwise_total_energy(&self, pool: &ProcessPool) -> Result<f64, EngineError> {
        let n_atoms = self.configuration.n_atoms();
        let rows = pool.two_body_loop_range(n_atoms);

        #[cfg(not(feature = "parallel"))]
        let iterator = rows;

        #[cfg(feature = "parallel")]
        let iterator = rows.into_par_iter();

        let local: f64 = iterator
            .map(|i| {
                (i + 1..n_atoms)
                    .map(|j| self.pair_energy(i, j, true))
                    .sum::<f64>()
            })
            .sum();

        let mut total = [local];
        pool.all_sum(&mut total, CommunicatorType::PoolProcesses)?;
        Ok(total[0])
    }
}
