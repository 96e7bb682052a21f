//! # Core Module
//!
//! Stateless building blocks shared by every process: the simulation box, the cell grid
//! that partitions it, the atomistic configuration living inside it, and the pair
//! potential evaluated between its atoms.
//!
//! ## Architecture
//!
//! - **Spatial Partitioning** ([`spatial`]) - Box geometry, cells, and neighbour lists
//! - **Atomistic Representation** ([`models`]) - Atoms, molecules, and configurations
//! - **Energy Functions** ([`forcefield`]) - Pair potentials
//!
//! ## Key Capabilities
//!
//! - **Minimum-image geometry** for cubic, orthorhombic, monoclinic, and triclinic boxes
//! - **Cell-based neighbour lists** guaranteeing every pair within the cutoff is visited
//! - **Deterministic iteration** so that replicated copies on every process agree
//! - **Consistent cell membership** maintained as atoms move

pub mod forcefield;
pub mod models;
pub mod spatial;
