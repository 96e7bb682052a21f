use nalgebra::{Point3, Vector3};
use std::collections::BTreeSet;

/// Integer grid reference of a cell within its array.
pub type GridReference = Vector3<i32>;

/// A single sub-volume of the simulation box.
///
/// Neighbours are stored as indices into the owning [`CellArray`](super::cell_array::CellArray).
/// Atoms are stored as indices into the owning configuration and always iterate in ascending
/// order, so every process walks a cell's contents identically.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    index: usize,
    grid_reference: GridReference,
    centre: Point3<f64>,
    near_neighbours: Vec<usize>,
    mim_neighbours: Vec<usize>,
    atoms: BTreeSet<usize>,
}

impl Cell {
    pub(crate) fn new(index: usize, grid_reference: GridReference, centre: Point3<f64>) -> Self {
        Self {
            index,
            grid_reference,
            centre,
            near_neighbours: Vec::new(),
            mim_neighbours: Vec::new(),
            atoms: BTreeSet::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn grid_reference(&self) -> &GridReference {
        &self.grid_reference
    }

    pub fn centre(&self) -> &Point3<f64> {
        &self.centre
    }

    /// Neighbours for which a plain difference vector is always the minimum image.
    pub fn near_neighbours(&self) -> &[usize] {
        &self.near_neighbours
    }

    /// Neighbours for which at least some atom pairs need minimum-image correction.
    pub fn mim_neighbours(&self) -> &[usize] {
        &self.mim_neighbours
    }

    /// All neighbours, near first. The cell itself is not included.
    pub fn neighbours(&self) -> impl Iterator<Item = usize> + '_ {
        self.near_neighbours
            .iter()
            .chain(self.mim_neighbours.iter())
            .copied()
    }

    pub fn n_neighbours(&self) -> usize {
        self.near_neighbours.len() + self.mim_neighbours.len()
    }

    pub fn atoms(&self) -> &BTreeSet<usize> {
        &self.atoms
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub(crate) fn set_centre(&mut self, centre: Point3<f64>) {
        self.centre = centre;
    }

    pub(crate) fn set_neighbours(&mut self, near: Vec<usize>, mim: Vec<usize>) {
        self.near_neighbours = near;
        self.mim_neighbours = mim;
    }

    pub(crate) fn add_atom(&mut self, atom: usize) -> bool {
        self.atoms.insert(atom)
    }

    pub(crate) fn remove_atom(&mut self, atom: usize) -> bool {
        self.atoms.remove(&atom)
    }

    pub(crate) fn clear_atoms(&mut self) {
        self.atoms.clear();
    }
}
