/// An ordered group of atoms moved as one rigid unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Molecule {
    pub(crate) index: usize,
    pub(crate) atoms: Vec<usize>,
}

impl Molecule {
    /// Stable index of the molecule within its configuration.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Atom indices in insertion order.
    pub fn atoms(&self) -> &[usize] {
        &self.atoms
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }
}
