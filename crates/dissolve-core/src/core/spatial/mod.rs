//! # Spatial Module
//!
//! Partitioning of the simulation box into a regular grid of cells.
//!
//! ## Overview
//!
//! Pair interactions are only evaluated between atoms in the same or neighbouring cells.
//! [`cell_array::CellArray::generate`] chooses the grid so that every pair of atoms closer than
//! the interaction cutoff lies in cells that list each other as neighbours, and records
//! whether each neighbour relation needs minimum-image correction.
//!
//! ## Architecture
//!
//! - **Box** ([`simulation_box`]) - Periodic cell geometry, folding and minimum image
//! - **Cells** ([`cell`]) - Individual cells with neighbour and atom membership lists
//! - **Cell Array** ([`cell_array`]) - Grid generation, addressing and range predicates
//! - **Errors** ([`error`]) - Geometry and indexing failures

pub mod cell;
pub mod cell_array;
pub mod error;
pub mod simulation_box;
