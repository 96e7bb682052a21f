use serde::Deserialize;

const OVERLAP_ENERGY: f64 = 1e10;

#[inline]
pub fn lennard_jones_12_6(dist: f64, sigma: f64, epsilon: f64) -> f64 {
    if dist < 1e-6 {
        return OVERLAP_ENERGY;
    }
    let sr6 = (sigma / dist).powi(6);
    4.0 * epsilon * (sr6 * sr6 - sr6)
}

/// Energy of an atom pair as a function of separation.
///
/// Truncation is applied by the caller at the cell array's interaction cutoff.
pub trait PairPotential: Send + Sync {
    fn energy(&self, dist: f64) -> f64;
}

/// A Lennard-Jones 12-6 potential shared by every atom pair.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LennardJones {
    /// Well depth, in kJ/mol.
    pub epsilon: f64,
    /// Zero-crossing distance, in Å.
    pub sigma: f64,
}

impl Default for LennardJones {
    fn default() -> Self {
        Self {
            epsilon: 0.65,
            sigma: 3.2,
        }
    }
}

impl PairPotential for LennardJones {
    #[inline]
    fn energy(&self, dist: f64) -> f64 {
        lennard_jones_12_6(dist, self.sigma, self.epsilon)
    }
}
