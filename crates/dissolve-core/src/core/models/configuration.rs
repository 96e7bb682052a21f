use super::atom::Atom;
use super::molecule::Molecule;
use crate::core::spatial::cell_array::CellArray;
use crate::core::spatial::error::SpatialError;
use crate::core::spatial::simulation_box::SimulationBox;
use nalgebra::{Point3, Rotation3, Vector3};
use tracing::debug;

/// Atoms, molecules and the cell array partitioning their box.
///
/// The configuration keeps cell membership consistent: whenever an atom moves through one of
/// the mutating methods, it is removed from its old cell and inserted into the new one.
#[derive(Debug, Clone)]
pub struct Configuration {
    cells: CellArray,
    atoms: Vec<Atom>,
    molecules: Vec<Molecule>,
}

impl Configuration {
    pub fn new(
        simulation_box: &SimulationBox,
        cell_size: f64,
        cutoff: f64,
    ) -> Result<Self, SpatialError> {
        Ok(Self::with_cells(CellArray::generate(
            simulation_box,
            cell_size,
            cutoff,
        )?))
    }

    pub fn with_cells(mut cells: CellArray) -> Self {
        cells.clear_atoms();
        Self {
            cells,
            atoms: Vec::new(),
            molecules: Vec::new(),
        }
    }

    pub fn simulation_box(&self) -> &SimulationBox {
        self.cells.simulation_box()
    }

    pub fn cells(&self) -> &CellArray {
        &self.cells
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, index: usize) -> Result<&Atom, SpatialError> {
        self.atoms.get(index).ok_or(SpatialError::AtomOutOfRange {
            index,
            count: self.atoms.len(),
        })
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn molecules(&self) -> &[Molecule] {
        &self.molecules
    }

    pub fn molecule(&self, index: usize) -> Result<&Molecule, SpatialError> {
        self.molecules
            .get(index)
            .ok_or(SpatialError::MoleculeOutOfRange {
                index,
                count: self.molecules.len(),
            })
    }

    pub fn n_molecules(&self) -> usize {
        self.molecules.len()
    }

    /// Adds a molecule built from `positions` and returns its index.
    pub fn add_molecule(&mut self, positions: &[Point3<f64>]) -> usize {
        let index = self.molecules.len();
        let mut atoms = Vec::with_capacity(positions.len());
        for r in positions {
            let position = self.place(r);
            let atom = self.atoms.len();
            let cell = self.cells.cell_index_for(&position);
            self.cells.cell_mut(cell).add_atom(atom);
            self.atoms.push(Atom {
                position,
                molecule: index,
                cell,
            });
            atoms.push(atom);
        }
        self.molecules.push(Molecule { index, atoms });
        index
    }

    fn place(&self, r: &Point3<f64>) -> Point3<f64> {
        if self.simulation_box().is_periodic() {
            self.simulation_box().fold(r)
        } else {
            *r
        }
    }

    /// Moves an atom and updates its cell membership.
    pub fn set_atom_position(
        &mut self,
        index: usize,
        r: &Point3<f64>,
    ) -> Result<(), SpatialError> {
        let position = self.place(r);
        let count = self.atoms.len();
        let atom = self
            .atoms
            .get_mut(index)
            .ok_or(SpatialError::AtomOutOfRange { index, count })?;
        atom.position = position;
        self.update_atom_location(index)
    }

    /// Re-derives the cell of an atom from its current position.
    pub fn update_atom_location(&mut self, index: usize) -> Result<(), SpatialError> {
        let count = self.atoms.len();
        let atom = self
            .atoms
            .get_mut(index)
            .ok_or(SpatialError::AtomOutOfRange { index, count })?;
        let new_cell = self.cells.cell_index_for(&atom.position);
        if new_cell != atom.cell {
            let old_cell = atom.cell;
            atom.cell = new_cell;
            self.cells.cell_mut(old_cell).remove_atom(index);
            self.cells.cell_mut(new_cell).add_atom(index);
        }
        Ok(())
    }

    pub fn update_molecule_locations(&mut self, molecule: usize) -> Result<(), SpatialError> {
        let atoms = self.molecule(molecule)?.atoms.clone();
        for atom in atoms {
            self.update_atom_location(atom)?;
        }
        Ok(())
    }

    /// Geometric centre of a molecule, assembled under minimum image about its first atom.
    pub fn molecule_centre(&self, molecule: usize) -> Result<Point3<f64>, SpatialError> {
        let atoms = self.molecule(molecule)?.atoms();
        let Some(&first) = atoms.first() else {
            return Ok(Point3::origin());
        };
        let reference = self.atoms[first].position;
        let sum = atoms.iter().fold(Vector3::zeros(), |sum, &atom| {
            sum + self
                .simulation_box()
                .minimum_vector(&reference, &self.atoms[atom].position)
        });
        Ok(reference + sum / atoms.len() as f64)
    }

    pub fn translate_molecule(
        &mut self,
        molecule: usize,
        delta: &Vector3<f64>,
    ) -> Result<(), SpatialError> {
        let atoms = self.molecule(molecule)?.atoms.clone();
        for atom in atoms {
            let r = self.atoms[atom].position + delta;
            self.set_atom_position(atom, &r)?;
        }
        Ok(())
    }

    /// Rotates a molecule rigidly about its geometric centre.
    pub fn rotate_molecule(
        &mut self,
        molecule: usize,
        rotation: &Rotation3<f64>,
    ) -> Result<(), SpatialError> {
        let centre = self.molecule_centre(molecule)?;
        let atoms = self.molecule(molecule)?.atoms.clone();
        for atom in atoms {
            let local = self
                .simulation_box()
                .minimum_vector(&centre, &self.atoms[atom].position);
            let r = centre + rotation * local;
            self.set_atom_position(atom, &r)?;
        }
        Ok(())
    }

    /// Scales the box, moving molecule centres with it and leaving molecular geometry intact.
    ///
    /// Cell membership of every atom is recomputed afterwards.
    pub fn scale_box(&mut self, factors: &Vector3<f64>) -> Result<(), SpatialError> {
        let centres = (0..self.molecules.len())
            .map(|m| self.molecule_centre(m))
            .collect::<Result<Vec<_>, _>>()?;
        let fractional: Vec<Point3<f64>> = centres
            .iter()
            .map(|c| self.simulation_box().real_to_frac(c))
            .collect();

        self.cells.scale(factors)?;

        for (molecule, (old_centre, frac)) in centres.iter().zip(&fractional).enumerate() {
            let shift = self.simulation_box().frac_to_real(frac) - old_centre;
            for &atom in &self.molecules[molecule].atoms {
                let r = self.atoms[atom].position + shift;
                self.atoms[atom].position = r;
            }
        }

        self.rebuild_cell_membership();
        debug!(
            volume = self.simulation_box().volume(),
            "Configuration box scaled."
        );
        Ok(())
    }

    /// Reassigns every atom to the cell containing it.
    pub fn rebuild_cell_membership(&mut self) {
        self.cells.clear_atoms();
        for index in 0..self.atoms.len() {
            let position = self.place(&self.atoms[index].position);
            let cell = self.cells.cell_index_for(&position);
            self.atoms[index].position = position;
            self.atoms[index].cell = cell;
            self.cells.cell_mut(cell).add_atom(index);
        }
    }
}
