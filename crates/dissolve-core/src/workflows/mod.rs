//! # Workflows Module
//!
//! Complete procedures built from the engine, run collectively by every process of a pool.
//!
//! ## Architecture
//!
//! - **Molecule Shake** ([`shake`]) - Metropolis Monte Carlo of rigid molecule translations
//!   and rotations, distributed over the pool by cell regions, with step sizes adapted
//!   towards a target acceptance rate.

pub mod shake;
