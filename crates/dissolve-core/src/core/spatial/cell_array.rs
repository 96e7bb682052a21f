use super::cell::{Cell, GridReference};
use super::error::SpatialError;
use super::simulation_box::{SimulationBox, perpendicular_widths};
use itertools::iproduct;
use nalgebra::{DMatrix, DVector, Matrix3, Point3, Vector3};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Hard floor on the number of cells along any axis.
pub const MIN_CELLS_PER_SIDE: i32 = 3;

const DIVISION_TOLERANCE: f64 = 0.01;

/// A pair of cells whose contents may interact. Self pairs have `first == second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPair {
    pub first: usize,
    pub second: usize,
    pub minimum_image: bool,
}

/// Regular partition of the simulation box into cells with precomputed neighbour lists.
#[derive(Debug, Clone)]
pub struct CellArray {
    simulation_box: SimulationBox,
    cutoff: f64,
    divisions: Vector3<i32>,
    real_cell_size: Vector3<f64>,
    fractional_cell_size: Vector3<f64>,
    extents: Vector3<i32>,
    neighbour_offsets: Vec<GridReference>,
    axes: Matrix3<f64>,
    cells: Vec<Cell>,
}

impl CellArray {
    /// Partitions `simulation_box` into cells of roughly `cell_size` and builds every
    /// cell's neighbour lists for the interaction `cutoff`.
    #[instrument(skip_all, name = "cell_array_generate")]
    pub fn generate(
        simulation_box: &SimulationBox,
        cell_size: f64,
        cutoff: f64,
    ) -> Result<Self, SpatialError> {
        if !(cell_size > 0.0 && cell_size.is_finite()) {
            return Err(SpatialError::InvalidCellSize(cell_size));
        }
        if !(cutoff > 0.0 && cutoff.is_finite()) {
            return Err(SpatialError::InvalidCutoff(cutoff));
        }

        let (divisions, real_cell_size) = Self::choose_divisions(simulation_box, cell_size);
        let fractional_cell_size = divisions.map(|d| 1.0 / d as f64);

        let mut axes = *simulation_box.axes();
        for axis in 0..3 {
            axes.column_mut(axis).scale_mut(fractional_cell_size[axis]);
        }

        info!(
            dx = divisions.x,
            dy = divisions.y,
            dz = divisions.z,
            size_x = real_cell_size.x,
            size_y = real_cell_size.y,
            size_z = real_cell_size.z,
            "Partitioning box into cells."
        );

        let mut cells = Vec::with_capacity((divisions.x * divisions.y * divisions.z) as usize);
        for (x, y, z) in iproduct!(0..divisions.x, 0..divisions.y, 0..divisions.z) {
            let grid = GridReference::new(x, y, z);
            let frac = Point3::new(
                (x as f64 + 0.5) * fractional_cell_size.x,
                (y as f64 + 0.5) * fractional_cell_size.y,
                (z as f64 + 0.5) * fractional_cell_size.z,
            );
            cells.push(Cell::new(cells.len(), grid, simulation_box.frac_to_real(&frac)));
        }

        let mut array = Self {
            simulation_box: simulation_box.clone(),
            cutoff,
            divisions,
            real_cell_size,
            fractional_cell_size,
            extents: Vector3::zeros(),
            neighbour_offsets: Vec::new(),
            axes,
            cells,
        };

        array.extents = array.compute_extents();
        array.neighbour_offsets = array.compute_neighbour_offsets();
        debug!(
            ex = array.extents.x,
            ey = array.extents.y,
            ez = array.extents.z,
            n_offsets = array.neighbour_offsets.len(),
            "Neighbour search extents determined."
        );
        array.build_neighbour_lists();

        let half_width = simulation_box.perpendicular_widths().min() * 0.5;
        if simulation_box.is_periodic() && cutoff > half_width {
            warn!(
                cutoff,
                half_width,
                "Cutoff exceeds half the narrowest box width, minimum-image distances may miss the nearest replica."
            );
        }

        info!(n_cells = array.n_cells(), "Cell array generated.");
        Ok(array)
    }

    fn choose_divisions(
        simulation_box: &SimulationBox,
        cell_size: f64,
    ) -> (Vector3<i32>, Vector3<f64>) {
        let lengths = simulation_box.axis_lengths();
        let mut divisions = lengths.map(|l| (l / cell_size) as i32);
        let mut real_cell_size = Vector3::zeros();

        let reference = (0..3).min_by_key(|&axis| divisions[axis]).unwrap_or(0);
        if divisions[reference] < MIN_CELLS_PER_SIDE {
            divisions[reference] = MIN_CELLS_PER_SIDE;
        }
        real_cell_size[reference] = lengths[reference] / divisions[reference] as f64;

        for n in 1..3 {
            let axis = (reference + n) % 3;
            let x = lengths[axis] / real_cell_size[reference];
            let whole = x.floor();
            let remainder = x - whole;
            let rounded = if remainder > 1.0 - DIVISION_TOLERANCE {
                whole + 1.0
            } else if remainder < 0.5 {
                whole
            } else if lengths[axis] / (whole + 1.0) < cell_size {
                whole
            } else {
                whole + 1.0
            };
            let count = (rounded as i32).max(MIN_CELLS_PER_SIDE);
            divisions[axis] = count;
            real_cell_size[axis] = lengths[axis] / count as f64;
        }

        (divisions, real_cell_size)
    }

    /// Cells needed along each axis to span the cutoff, measured between opposite cell faces
    /// rather than along the axis so that skewed cells are not undercounted.
    fn compute_extents(&self) -> Vector3<i32> {
        let widths = perpendicular_widths(&self.axes);
        let mut extents = Vector3::zeros();
        for axis in 0..3 {
            let mut e = ((self.cutoff / widths[axis]).ceil() as i32).max(1);
            if 2 * e + 1 > self.divisions[axis] {
                e = self.divisions[axis] / 2;
            }
            extents[axis] = e;
        }
        extents
    }

    fn compute_neighbour_offsets(&self) -> Vec<GridReference> {
        let e = self.extents;
        let mut seen = HashSet::new();
        let mut offsets = Vec::new();
        for (x, y, z) in iproduct!(-e.x..=e.x, -e.y..=e.y, -e.z..=e.z) {
            let offset = GridReference::new(x, y, z);
            if offset == GridReference::zeros() {
                continue;
            }
            if self.image_separation(&offset) <= self.cutoff
                && seen.insert(self.cell_index_at(x, y, z))
            {
                offsets.push(offset);
            }
        }
        offsets
    }

    /// Smallest distance between any point of the home cell and any point of the cell at
    /// grid offset `delta`, without periodic images.
    ///
    /// The separation vector is `axes * (delta + u)` for `u` in `[-1, 1]^3`. Each component of
    /// `u` is either pinned to a bound or free at the unconstrained optimum, so trying every
    /// pinning pattern and keeping the feasible candidates finds the exact minimum.
    fn cell_separation(&self, delta: &GridReference) -> f64 {
        let centre = delta.cast::<f64>();
        let mut best = f64::INFINITY;
        for (px, py, pz) in iproduct!(-1..=1, -1..=1, -1..=1) {
            let pattern = [px, py, pz];
            let free: Vec<usize> = (0..3).filter(|&axis| pattern[axis] == 0).collect();
            let mut u = Vector3::new(px as f64, py as f64, pz as f64);
            if !free.is_empty() {
                let fixed = self.axes * (centre + u);
                let m = DMatrix::from_fn(3, free.len(), |row, col| self.axes[(row, free[col])]);
                let rhs = -(m.transpose() * DVector::from_column_slice(fixed.as_slice()));
                let Some(x) = (m.transpose() * &m).lu().solve(&rhs) else {
                    continue;
                };
                if x.iter().any(|v| v.abs() > 1.0 + 1e-12) {
                    continue;
                }
                for (col, &axis) in free.iter().enumerate() {
                    u[axis] = x[col];
                }
            }
            best = best.min((self.axes * (centre + u)).norm());
        }
        best
    }

    /// [`Self::cell_separation`] over the nearest periodic images of the offset cell.
    fn image_separation(&self, delta: &GridReference) -> f64 {
        if !self.simulation_box.is_periodic() {
            return self.cell_separation(delta);
        }
        let d = self.divisions;
        iproduct!(-1..=1, -1..=1, -1..=1)
            .map(|(x, y, z)| {
                self.cell_separation(&(delta + GridReference::new(x * d.x, y * d.y, z * d.z)))
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// True if some point pair of the two cells may be half a box length or more apart along
    /// an axis, beyond which the plain difference vector stops being the minimum image.
    fn requires_minimum_image(&self, a: &GridReference, b: &GridReference) -> bool {
        if !self.simulation_box.is_periodic() {
            return false;
        }
        let delta = b - a;
        (0..3).any(|axis| 2 * (delta[axis].abs() + 1) > self.divisions[axis])
    }

    pub fn simulation_box(&self) -> &SimulationBox {
        &self.simulation_box
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn divisions(&self) -> &Vector3<i32> {
        &self.divisions
    }

    pub fn real_cell_size(&self) -> &Vector3<f64> {
        &self.real_cell_size
    }

    pub fn fractional_cell_size(&self) -> &Vector3<f64> {
        &self.fractional_cell_size
    }

    pub fn extents(&self) -> &Vector3<i32> {
        &self.extents
    }

    pub fn neighbour_offsets(&self) -> &[GridReference] {
        &self.neighbour_offsets
    }

    /// Cell axes: the box axes with each column scaled to one cell width.
    pub fn axes(&self) -> &Matrix3<f64> {
        &self.axes
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> &Cell {
        debug_assert!(index < self.cells.len(), "cell index {index} out of range");
        &self.cells[index]
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub(crate) fn cell_mut(&mut self, index: usize) -> &mut Cell {
        debug_assert!(index < self.cells.len(), "cell index {index} out of range");
        &mut self.cells[index]
    }

    /// Linear index of the cell at the wrapped grid reference `(x, y, z)`.
    pub fn cell_index_at(&self, x: i32, y: i32, z: i32) -> usize {
        let d = &self.divisions;
        let (x, y, z) = (x.rem_euclid(d.x), y.rem_euclid(d.y), z.rem_euclid(d.z));
        (x * d.y * d.z + y * d.z + z) as usize
    }

    pub fn cell_at(&self, x: i32, y: i32, z: i32) -> &Cell {
        &self.cells[self.cell_index_at(x, y, z)]
    }

    /// Linear index of the cell containing the (folded) real-space position `r`.
    pub fn cell_index_for(&self, r: &Point3<f64>) -> usize {
        let frac = self.simulation_box.fold_frac(r);
        let grid = frac.coords.component_div(&self.fractional_cell_size);
        self.cell_index_at(grid.x as i32, grid.y as i32, grid.z as i32)
    }

    pub fn cell_for(&self, r: &Point3<f64>) -> &Cell {
        &self.cells[self.cell_index_for(r)]
    }

    /// Minimum-image grid delta from cell `a` to cell `b`.
    pub fn mim_grid_delta(&self, a: usize, b: usize) -> GridReference {
        let delta = self.cell(b).grid_reference() - self.cell(a).grid_reference();
        self.mim_grid_delta_of(&delta)
    }

    /// Applies the minimum-image convention to a raw grid delta.
    pub fn mim_grid_delta_of(&self, delta: &GridReference) -> GridReference {
        let mut result = *delta;
        for axis in 0..3 {
            let d = self.divisions[axis];
            let half = d as f64 * 0.5;
            if result[axis] as f64 > half {
                result[axis] -= d;
            } else if (result[axis] as f64) < -half {
                result[axis] += d;
            }
        }
        result
    }

    /// Whether any point in cell `a` could lie within `distance` of any point in cell `b`
    /// or one of its nearest periodic images.
    pub fn within_range(&self, a: usize, b: usize, distance: f64) -> bool {
        let delta = self.cell(b).grid_reference() - self.cell(a).grid_reference();
        self.image_separation(&delta) <= distance
    }

    /// Whether pairs between cell `a` and its neighbour `b` need minimum-image correction.
    pub fn minimum_image_required(&self, a: usize, b: usize) -> bool {
        debug_assert!(b < self.cells.len(), "cell index {b} out of range");
        self.cell(a).mim_neighbours().contains(&b)
    }

    /// All neighbours of `index`, near first, excluding the cell itself.
    pub fn neighbours(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.cell(index).neighbours()
    }

    /// Every interacting cell pair exactly once, self pairs included.
    pub fn neighbour_pairs(&self) -> Vec<CellPair> {
        let mut pairs = Vec::new();
        for cell in &self.cells {
            let first = cell.index();
            pairs.push(CellPair {
                first,
                second: first,
                minimum_image: false,
            });
            pairs.extend(
                cell.near_neighbours()
                    .iter()
                    .filter(|&&second| second > first)
                    .map(|&second| CellPair {
                        first,
                        second,
                        minimum_image: false,
                    }),
            );
            pairs.extend(
                cell.mim_neighbours()
                    .iter()
                    .filter(|&&second| second > first)
                    .map(|&second| CellPair {
                        first,
                        second,
                        minimum_image: true,
                    }),
            );
        }
        pairs
    }

    /// Rescales cell sizes and axes after a box volume change.
    ///
    /// Atom membership is left untouched; the caller must reassign atoms.
    pub fn scale(&mut self, factors: &Vector3<f64>) -> Result<(), SpatialError> {
        self.simulation_box.scale(factors)?;
        self.real_cell_size.component_mul_assign(factors);
        for axis in 0..3 {
            self.axes.column_mut(axis).scale_mut(factors[axis]);
        }
        for cell in &mut self.cells {
            let frac = Point3::from(
                (cell.grid_reference().cast::<f64>() + Vector3::repeat(0.5))
                    .component_mul(&self.fractional_cell_size),
            );
            let centre = self.simulation_box.frac_to_real(&frac);
            cell.set_centre(centre);
        }
        Ok(())
    }

    pub fn clear_atoms(&mut self) {
        for cell in &mut self.cells {
            cell.clear_atoms();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn cubic_array() -> CellArray {
        let b = SimulationBox::cubic(30.0).unwrap();
        CellArray::generate(&b, 5.0, 9.0).unwrap()
    }

    fn divisions_for(lengths: Vector3<f64>, cell_size: f64) -> Vector3<i32> {
        let b = SimulationBox::orthorhombic(lengths).unwrap();
        *CellArray::generate(&b, cell_size, 4.0).unwrap().divisions()
    }

    /// Smallest possible distance between points of two orthorhombic cells.
    fn closest_approach(array: &CellArray, a: usize, b: usize) -> f64 {
        let delta = array.mim_grid_delta(a, b);
        let size = array.real_cell_size();
        (0..3)
            .map(|axis| {
                let gap = (delta[axis].abs() - 1).max(0) as f64 * size[axis];
                gap * gap
            })
            .sum::<f64>()
            .sqrt()
    }

    #[test]
    fn cubic_box_produces_expected_grid() {
        let array = cubic_array();
        assert_eq!(*array.divisions(), Vector3::new(6, 6, 6));
        assert_eq!(array.n_cells(), 216);
        assert_eq!(*array.extents(), Vector3::new(2, 2, 2));
        assert!((array.real_cell_size().x - 5.0).abs() < 1e-12);
    }

    #[test]
    fn too_few_divisions_are_raised_to_the_floor() {
        let b = SimulationBox::cubic(10.0).unwrap();
        let array = CellArray::generate(&b, 5.0, 3.0).unwrap();
        assert_eq!(*array.divisions(), Vector3::new(3, 3, 3));
        let array = CellArray::generate(&b, 50.0, 3.0).unwrap();
        assert_eq!(*array.divisions(), Vector3::new(3, 3, 3));
    }

    #[test]
    fn other_axes_follow_the_rounding_rule() {
        assert_eq!(divisions_for(Vector3::new(30.0, 31.0, 45.0), 5.0), Vector3::new(6, 6, 9));
        assert_eq!(divisions_for(Vector3::new(30.0, 33.0, 30.0), 5.0), Vector3::new(6, 6, 6));
        assert_eq!(divisions_for(Vector3::new(30.0, 34.98, 30.0), 5.0), Vector3::new(6, 7, 6));
        assert_eq!(divisions_for(Vector3::new(30.0, 38.0, 30.0), 4.0), Vector3::new(7, 9, 7));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let b = SimulationBox::cubic(30.0).unwrap();
        assert_eq!(
            CellArray::generate(&b, 0.0, 9.0).unwrap_err(),
            SpatialError::InvalidCellSize(0.0)
        );
        assert_eq!(
            CellArray::generate(&b, 5.0, -1.0).unwrap_err(),
            SpatialError::InvalidCutoff(-1.0)
        );
    }

    #[test]
    fn every_grid_reference_maps_to_exactly_one_cell() {
        let b = SimulationBox::orthorhombic(Vector3::new(20.0, 25.0, 31.0)).unwrap();
        let array = CellArray::generate(&b, 4.0, 7.5).unwrap();
        let d = *array.divisions();
        assert_eq!((d.x * d.y * d.z) as usize, array.n_cells());

        let mut seen = HashSet::new();
        for (x, y, z) in iproduct!(0..d.x, 0..d.y, 0..d.z) {
            let cell = array.cell_at(x, y, z);
            assert_eq!(*cell.grid_reference(), GridReference::new(x, y, z));
            assert!(seen.insert(cell.index()));
        }
        assert_eq!(seen.len(), array.n_cells());
    }

    #[test]
    fn wrapped_addressing_uses_euclidean_modulo() {
        let array = cubic_array();
        for (x, y, z) in iproduct!(-13..13, -7..8, -1..14) {
            assert_eq!(
                array.cell_index_at(x, y, z),
                array.cell_index_at(x.rem_euclid(6), y.rem_euclid(6), z.rem_euclid(6))
            );
        }
        assert_eq!(array.cell_at(-1, 0, 0).grid_reference().x, 5);
    }

    #[test]
    fn neighbour_relation_is_symmetric_and_excludes_self() {
        let boxes = [
            SimulationBox::cubic(30.0).unwrap(),
            SimulationBox::orthorhombic(Vector3::new(20.0, 25.0, 31.0)).unwrap(),
            SimulationBox::from_lengths_and_angles(
                Vector3::new(22.0, 24.0, 26.0),
                Vector3::new(75.0, 85.0, 100.0),
            )
            .unwrap(),
        ];
        for b in &boxes {
            let array = CellArray::generate(b, 4.0, 7.5).unwrap();
            for cell in array.cells() {
                let mut unique = HashSet::new();
                for neighbour in cell.neighbours() {
                    assert_ne!(neighbour, cell.index());
                    assert!(unique.insert(neighbour), "duplicate neighbour");
                    assert!(
                        array.neighbours(neighbour).any(|n| n == cell.index()),
                        "cell {} lists {} but not vice versa",
                        cell.index(),
                        neighbour
                    );
                }
            }
        }
    }

    #[test]
    fn cells_outside_neighbour_lists_are_beyond_cutoff() {
        for (lengths, cell_size, cutoff) in [
            (Vector3::new(30.0, 30.0, 30.0), 5.0, 9.0),
            (Vector3::new(20.0, 25.0, 31.0), 4.0, 7.5),
            (Vector3::new(40.0, 18.0, 27.0), 3.0, 6.0),
        ] {
            let b = SimulationBox::orthorhombic(lengths).unwrap();
            let array = CellArray::generate(&b, cell_size, cutoff).unwrap();
            for cell in array.cells() {
                let neighbours: HashSet<usize> = cell.neighbours().collect();
                for other in 0..array.n_cells() {
                    if other == cell.index() || neighbours.contains(&other) {
                        continue;
                    }
                    assert!(
                        closest_approach(&array, cell.index(), other) >= cutoff - 1e-9,
                        "cells {} and {} may interact but are not neighbours",
                        cell.index(),
                        other
                    );
                }
            }
        }
    }

    #[test]
    fn skewed_boxes_list_every_pair_within_cutoff() {
        let boxes = [
            SimulationBox::from_lengths_and_angles(Vector3::repeat(20.0), Vector3::repeat(60.0))
                .unwrap(),
            SimulationBox::from_lengths_and_angles(
                Vector3::new(22.0, 24.0, 26.0),
                Vector3::new(75.0, 85.0, 100.0),
            )
            .unwrap(),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        for b in &boxes {
            let cutoff = 6.0;
            let array = CellArray::generate(b, 3.0, cutoff).unwrap();
            let points: Vec<Point3<f64>> = (0..400)
                .map(|_| b.frac_to_real(&Point3::new(rng.r#gen(), rng.r#gen(), rng.r#gen())))
                .collect();
            let homes: Vec<usize> = points.iter().map(|r| array.cell_index_for(r)).collect();
            for (i, j) in iproduct!(0..points.len(), 0..points.len()) {
                if i >= j || homes[i] == homes[j] {
                    continue;
                }
                let dist = b.minimum_distance(&points[i], &points[j]);
                if dist >= cutoff {
                    continue;
                }
                assert!(
                    array.neighbours(homes[i]).any(|n| n == homes[j]),
                    "points {i} and {j} are {dist} apart but cells {} and {} are not neighbours",
                    homes[i],
                    homes[j]
                );
                if !array.minimum_image_required(homes[i], homes[j]) {
                    assert!(((points[j] - points[i]).norm() - dist).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn skewed_cells_need_wider_extents() {
        let b = SimulationBox::from_lengths_and_angles(Vector3::repeat(20.0), Vector3::repeat(60.0))
            .unwrap();
        let array = CellArray::generate(&b, 3.0, 6.0).unwrap();
        let widths = perpendicular_widths(array.axes());
        for axis in 0..3 {
            let e = array.extents()[axis];
            let d = array.divisions()[axis];
            assert!(e as f64 * widths[axis] >= 6.0 || 2 * e + 1 >= d);
            assert!(widths[axis] < array.real_cell_size()[axis]);
        }
    }

    #[test]
    fn wrapped_neighbours_require_minimum_image() {
        let array = cubic_array();
        let origin = array.cell_index_at(0, 0, 0);
        let adjacent = array.cell_index_at(1, 0, 0);
        let wrapped = array.cell_index_at(-1, 0, 0);
        let wrapped_far = array.cell_index_at(-2, 0, 0);
        assert!(!array.minimum_image_required(origin, adjacent));
        assert!(array.minimum_image_required(origin, wrapped));
        assert!(array.minimum_image_required(origin, wrapped_far));
        assert!(array.cell(origin).near_neighbours().contains(&adjacent));
    }

    #[test]
    fn non_periodic_box_never_requires_minimum_image() {
        let b = SimulationBox::non_periodic(Vector3::repeat(30.0)).unwrap();
        let array = CellArray::generate(&b, 5.0, 9.0).unwrap();
        assert!(array.cells().iter().all(|c| c.mim_neighbours().is_empty()));
    }

    #[test]
    fn within_range_measures_the_gap_between_cells() {
        let array = cubic_array();
        let origin = array.cell_index_at(0, 0, 0);
        assert!(array.within_range(origin, array.cell_index_at(1, 1, 0), 0.0));
        let three_away = array.cell_index_at(3, 0, 0);
        assert!(!array.within_range(origin, three_away, 9.0));
        assert!(array.within_range(origin, three_away, 10.0));
        let wrapped = array.cell_index_at(-3, 0, 0);
        assert!(array.within_range(origin, wrapped, 10.0));
    }

    #[test]
    fn positions_map_to_containing_cells() {
        let array = cubic_array();
        assert_eq!(array.cell_index_for(&Point3::new(2.0, 2.0, 2.0)), 0);
        assert_eq!(
            array.cell_index_for(&Point3::new(-1.0, 0.5, 0.5)),
            array.cell_index_at(5, 0, 0)
        );
        assert_eq!(
            array.cell_index_for(&Point3::new(12.5, 29.9, 61.0)),
            array.cell_index_at(2, 5, 0)
        );
        let centre = *array.cell(77).centre();
        assert_eq!(array.cell_index_for(&centre), 77);
    }

    #[test]
    fn neighbour_pairs_cover_each_pair_once() {
        let array = cubic_array();
        let pairs = array.neighbour_pairs();
        let mut seen = HashSet::new();
        for pair in &pairs {
            assert!(pair.first <= pair.second);
            assert!(seen.insert((pair.first, pair.second)));
            assert_eq!(
                pair.minimum_image,
                array.minimum_image_required(pair.first, pair.second)
            );
        }
        let total: usize = array.cells().iter().map(Cell::n_neighbours).sum();
        assert_eq!(pairs.len(), array.n_cells() + total / 2);
    }

    #[test]
    fn scale_adjusts_sizes_but_not_topology() {
        let mut array = cubic_array();
        let neighbours_before: Vec<usize> = array.neighbours(10).collect();
        array.scale(&Vector3::new(2.0, 1.0, 1.0)).unwrap();
        assert!((array.real_cell_size().x - 10.0).abs() < 1e-12);
        assert!((array.axes()[(0, 0)] - 10.0).abs() < 1e-12);
        assert!((array.simulation_box().axis_length(0) - 60.0).abs() < 1e-12);
        assert_eq!(array.neighbours(10).collect::<Vec<_>>(), neighbours_before);
        assert!((array.cell(0).centre().x - 5.0).abs() < 1e-12);
    }
}
