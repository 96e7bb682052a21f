use nalgebra::Point3;

/// A single particle of the configuration.
///
/// Atoms are owned by the [`Configuration`](super::configuration::Configuration) and addressed
/// by their index in its atom array. Each atom records the molecule it belongs to and the
/// cell it currently occupies; both are indices rather than references so that every process
/// holding a copy of the configuration agrees on them.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Position in Angstroms. Folded into the box for periodic configurations.
    pub(crate) position: Point3<f64>,
    /// Index of the parent molecule.
    pub(crate) molecule: usize,
    /// Index of the cell the atom currently sits in.
    pub(crate) cell: usize,
}

impl Atom {
    pub fn position(&self) -> &Point3<f64> {
        &self.position
    }

    pub fn molecule(&self) -> usize {
        self.molecule
    }

    pub fn cell(&self) -> usize {
        self.cell
    }
}
