use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpatialError {
    #[error("Cell size must be positive, got {0}")]
    InvalidCellSize(f64),

    #[error("Pair interaction cutoff must be positive, got {0}")]
    InvalidCutoff(f64),

    #[error("Invalid box geometry: {0}")]
    InvalidBox(String),

    #[error("Atom index {index} out of range (configuration holds {count} atoms)")]
    AtomOutOfRange { index: usize, count: usize },

    #[error("Molecule index {index} out of range (configuration holds {count} molecules)")]
    MoleculeOutOfRange { index: usize, count: usize },
}
