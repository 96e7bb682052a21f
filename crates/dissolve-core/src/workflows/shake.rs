use crate::core::forcefield::potentials::PairPotential;
use crate::core::models::configuration::Configuration;
use crate::core::spatial::error::SpatialError;
use crate::engine::change_store::ChangeStore;
use crate::engine::config::{ShakeConfig, SimulationConfig};
use crate::engine::distributor::RegionalDistributor;
use crate::engine::energy::EnergyKernel;
use crate::engine::error::EngineError;
use crate::engine::progress::{ShakeEvent, ShakeObserver, notify};
use crate::parallel::pool::{CommunicatorType, ProcessPool};
use crate::parallel::random::RandomBuffer;
use nalgebra::{Rotation3, Vector3};
use tracing::{debug, info, instrument};

/// Gas constant in kJ mol⁻¹ K⁻¹.
const GAS_CONSTANT: f64 = 0.008314472;
/// Step scaling applied when no move of a kind was accepted.
const NO_ACCEPTANCE_SCALING: f64 = 0.8;
/// Length of the cycle deciding between rotation-only, translation-only and combined moves.
const MOVE_PATTERN_LENGTH: usize = 10;

/// Attempt and acceptance counts, summed over the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShakeStatistics {
    pub attempts: i64,
    pub translation_attempts: i64,
    pub translations_accepted: i64,
    pub rotation_attempts: i64,
    pub rotations_accepted: i64,
    /// Sum of the energy changes of accepted moves, in kJ/mol.
    pub total_delta: f64,
}

impl ShakeStatistics {
    fn record(&mut self, kind: MoveKind, accepted: bool, delta: f64) {
        self.attempts += 1;
        if kind.translates() {
            self.translation_attempts += 1;
            self.translations_accepted += i64::from(accepted);
        }
        if kind.rotates() {
            self.rotation_attempts += 1;
            self.rotations_accepted += i64::from(accepted);
        }
        if accepted {
            self.total_delta += delta;
        }
    }

    fn all_sum(&mut self, pool: &ProcessPool) -> Result<(), EngineError> {
        let mut counts = [
            self.attempts,
            self.translation_attempts,
            self.translations_accepted,
            self.rotation_attempts,
            self.rotations_accepted,
        ];
        pool.all_sum(&mut counts, CommunicatorType::PoolProcesses)?;
        let mut delta = [self.total_delta];
        pool.all_sum(&mut delta, CommunicatorType::PoolProcesses)?;
        [
            self.attempts,
            self.translation_attempts,
            self.translations_accepted,
            self.rotation_attempts,
            self.rotations_accepted,
        ] = counts;
        self.total_delta = delta[0];
        Ok(())
    }

    pub fn translation_acceptance(&self) -> Option<f64> {
        rate(self.translations_accepted, self.translation_attempts)
    }

    pub fn rotation_acceptance(&self) -> Option<f64> {
        rate(self.rotations_accepted, self.rotation_attempts)
    }
}

fn rate(accepted: i64, attempts: i64) -> Option<f64> {
    (attempts > 0).then(|| accepted as f64 / attempts as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShakeResult {
    pub statistics: ShakeStatistics,
    /// Adapted translation step for the next run, in Å.
    pub translation_step: f64,
    /// Adapted rotation step for the next run, in degrees.
    pub rotation_step: f64,
    pub initial_energy: f64,
    pub final_energy: f64,
    pub n_cycles: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveKind {
    Rotate,
    Translate,
    Both,
}

impl MoveKind {
    fn from_counter(counter: usize) -> Self {
        match counter {
            0 => MoveKind::Rotate,
            1 => MoveKind::Translate,
            _ => MoveKind::Both,
        }
    }

    fn translates(self) -> bool {
        matches!(self, MoveKind::Translate | MoveKind::Both)
    }

    fn rotates(self) -> bool {
        matches!(self, MoveKind::Rotate | MoveKind::Both)
    }
}

/// Splits the pool into the process groups requested by `config`, if any.
///
/// Collective over the whole pool. Must be called before the pool is shared with a workflow.
pub fn prepare_pool(
    pool: &mut ProcessPool,
    config: &SimulationConfig,
) -> Result<(), EngineError> {
    if let Some(groups) = config.process_groups {
        pool.assign_processes_to_groups(groups)?;
    }
    Ok(())
}

/// Monte Carlo shake of whole molecules: random rigid translations and rotations accepted
/// under the Metropolis criterion.
///
/// Collective over the whole pool; every process must pass an identical configuration and
/// ends with the same updated configuration. `targets` restricts the moves to a subset of
/// molecules. Step sizes are adapted towards the target acceptance rate and returned in the
/// result rather than written back. Energies come from the configured pair potential.
#[instrument(skip_all, name = "shake_workflow")]
pub fn run(
    pool: &ProcessPool,
    configuration: &mut Configuration,
    config: &SimulationConfig,
    targets: Option<&[usize]>,
    observer: Option<&dyn ShakeObserver>,
) -> Result<ShakeResult, EngineError> {
    let shake = &config.shake;
    let potential = &config.potential;
    let r_rt = 1.0 / (GAS_CONSTANT * shake.temperature);
    info!(
        shakes_per_molecule = shake.shakes_per_molecule,
        translation_step = shake.translation_step,
        rotation_step = shake.rotation_step,
        cutoff = configuration.cells().cutoff(),
        epsilon = potential.epsilon,
        sigma = potential.sigma,
        "Starting molecule shake."
    );

    let strategy = pool.best_strategy();
    let initial_energy =
        EnergyKernel::new(configuration, potential).total_energy(pool, strategy)?;

    let mut distributor = RegionalDistributor::new(pool, configuration, strategy);
    if let Some(indices) = targets {
        distributor.set_target_molecules(indices);
    }
    let mut store = ChangeStore::new(pool);
    notify(
        observer,
        ShakeEvent::Started {
            n_targets: distributor.n_targets(),
            initial_energy,
        },
    );

    let mut lockstep = distributor.lockstep_strategy();
    let mut random =
        RandomBuffer::with_size(pool, lockstep, config.seed, config.random_buffer_size)?;
    let mut counter = draw_counter(&mut random)?;
    let mut statistics = ShakeStatistics::default();

    while distributor.cycle(configuration)? {
        if distributor.lockstep_strategy() != lockstep {
            lockstep = distributor.lockstep_strategy();
            random.reset(lockstep)?;
            counter = draw_counter(&mut random)?;
        }

        let molecules = distributor.assigned_molecules().to_vec();
        for &molecule in &molecules {
            store.add_molecule(configuration, molecule)?;
            let mut current = molecule_energy(configuration, potential, molecule)?;

            for _ in 0..shake.shakes_per_molecule {
                let kind = MoveKind::from_counter(counter);
                apply_move(configuration, molecule, kind, shake, &mut random)?;

                let trial = molecule_energy(configuration, potential, molecule)?;
                let delta = trial - current;
                let accepted = delta < 0.0 || random.random()? < (-delta * r_rt).exp();
                if accepted {
                    store.update_all(configuration)?;
                    current = trial;
                } else {
                    store.revert_all(configuration)?;
                }

                if distributor.owns_statistics() {
                    statistics.record(kind, accepted, delta);
                }
                counter = (counter + 1) % MOVE_PATTERN_LENGTH;
            }
            store.store_and_reset();
        }

        let applied = store.distribute_and_apply(configuration)?;
        store.reset();
        debug!(
            cycle = distributor.n_cycles(),
            molecules = molecules.len(),
            applied,
            strategy = ?distributor.current_strategy(),
            "Shake cycle complete."
        );
        notify(
            observer,
            ShakeEvent::CycleComplete {
                cycle: distributor.n_cycles(),
                n_distributed: distributor.n_distributed(),
                n_targets: distributor.n_targets(),
            },
        );
    }

    statistics.all_sum(pool)?;
    let final_energy =
        EnergyKernel::new(configuration, potential).total_energy(pool, strategy)?;

    let translation_step = adapt_step(
        shake.translation_step,
        statistics.translation_acceptance(),
        statistics.translations_accepted,
        shake.target_acceptance_rate,
        shake.translation_step_min,
        shake.translation_step_max,
    );
    let rotation_step = adapt_step(
        shake.rotation_step,
        statistics.rotation_acceptance(),
        statistics.rotations_accepted,
        shake.target_acceptance_rate,
        shake.rotation_step_min,
        shake.rotation_step_max,
    );

    info!(
        attempts = statistics.attempts,
        translation_acceptance = statistics.translation_acceptance().unwrap_or(0.0),
        rotation_acceptance = statistics.rotation_acceptance().unwrap_or(0.0),
        total_delta = statistics.total_delta,
        translation_step,
        rotation_step,
        "Molecule shake complete."
    );
    notify(
        observer,
        ShakeEvent::Finished {
            n_cycles: distributor.n_cycles(),
            final_energy,
        },
    );

    Ok(ShakeResult {
        statistics,
        translation_step,
        rotation_step,
        initial_energy,
        final_energy,
        n_cycles: distributor.n_cycles(),
    })
}

fn draw_counter(random: &mut RandomBuffer) -> Result<usize, EngineError> {
    let counter = (random.random()? * MOVE_PATTERN_LENGTH as f64) as usize;
    Ok(counter.min(MOVE_PATTERN_LENGTH - 1))
}

fn molecule_energy<P: PairPotential>(
    configuration: &Configuration,
    potential: &P,
    molecule: usize,
) -> Result<f64, SpatialError> {
    EnergyKernel::new(configuration, potential).molecule_energy(molecule)
}

fn apply_move(
    configuration: &mut Configuration,
    molecule: usize,
    kind: MoveKind,
    shake: &ShakeConfig,
    random: &mut RandomBuffer,
) -> Result<(), EngineError> {
    if kind.translates() {
        let delta = Vector3::new(
            random.random_plus_minus_one()? * shake.translation_step,
            random.random_plus_minus_one()? * shake.translation_step,
            random.random_plus_minus_one()? * shake.translation_step,
        );
        configuration.translate_molecule(molecule, &delta)?;
    }
    if kind.rotates() {
        let about_x = (random.random_plus_minus_one()? * shake.rotation_step).to_radians();
        let about_y = (random.random_plus_minus_one()? * shake.rotation_step).to_radians();
        let rotation = Rotation3::from_euler_angles(about_x, about_y, 0.0);
        configuration.rotate_molecule(molecule, &rotation)?;
    }
    Ok(())
}

fn adapt_step(
    step: f64,
    acceptance: Option<f64>,
    n_accepted: i64,
    target: f64,
    min: f64,
    max: f64,
) -> f64 {
    let scaled = match acceptance {
        Some(rate) if n_accepted > 0 => step * rate / target,
        _ => step * NO_ACCEPTANCE_SCALING,
    };
    scaled.clamp(min, max)
}
