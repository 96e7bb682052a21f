//! # Force Field Module
//!
//! Pair potentials evaluated between atoms of different molecules.
//!
//! Only a single truncated Lennard-Jones form is provided, used by the cell-list energy
//! kernel in [`crate::engine::energy`]. Alternative forms implement [`potentials::PairPotential`].

pub mod potentials;
