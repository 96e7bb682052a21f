//! # Engine Module
//!
//! The stateful machinery that lets several processes move molecules of one shared
//! configuration concurrently without stepping on each other.
//!
//! ## Overview
//!
//! Each cycle the [`distributor`] hands every worker a set of molecules whose surrounding
//! cells no other worker touches. Workers try moves locally, keep the accepted ones in a
//! [`change_store`], and finally exchange them so that every process again holds an
//! identical configuration. Energies of molecules and of the whole configuration come from
//! the cell-list [`energy`] kernel.
//!
//! ## Architecture
//!
//! - **Molecule Scheduling** ([`distributor`]) - Cell locking and per-cycle assignment
//! - **Change Tracking** ([`change_store`]) - Snapshots, reverts, and collective application
//! - **Energy Evaluation** ([`energy`]) - Molecule and strategy-divided total energies
//! - **Configuration** ([`config`]) - Simulation parameters, TOML loading, and validation
//! - **Progress Monitoring** ([`progress`]) - Shake milestones delivered to an observer
//! - **Error Handling** ([`error`]) - Engine-level error type wrapping lower layers

pub mod change_store;
pub mod config;
pub mod distributor;
pub mod energy;
pub mod error;
pub mod progress;
