//! # Dissolve Core Library
//!
//! Spatial partitioning, cell locking, and distributed pair-interaction evaluation for
//! molecular simulation over a pool of cooperating processes.
//!
//! ## Architectural Philosophy
//!
//! Every process runs the same program over its own copy of the configuration, and the
//! library keeps those copies identical. The crate is layered so that each layer depends
//! only on the ones below it.
//!
//! - **[`parallel`]: The Transport.** Worlds, process pools and groups, collectives, work
//!   division strategies, and buffered random streams shared across a scope.
//!
//! - **[`core`]: The Foundation.** The simulation box, the cell array with its near and
//!   minimum-image neighbour lists, the atomistic configuration, and pair potentials.
//!
//! - **[`engine`]: The Logic Core.** The regional distributor that hands molecules to
//!   workers without overlapping cell regions, the change store that synchronises accepted
//!   moves, the cell-list energy kernel, configuration, and progress reporting.
//!
//! - **[`workflows`]: The Public API.** Complete procedures such as the molecule shake that
//!   drive the engine end to end.

pub mod core;
pub mod engine;
pub mod parallel;
pub mod workflows;
