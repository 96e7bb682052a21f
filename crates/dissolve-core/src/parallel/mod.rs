//! # Parallel Module
//!
//! Message-passing primitives used to run one simulation over several cooperating
//! processes in lockstep.
//!
//! ## Overview
//!
//! Every process executes the same program. A [`world::World`] connects the processes
//! through a [`transport::Transport`]; a [`pool::ProcessPool`] names a subset of the world,
//! splits it into process groups with leaders, and offers collective operations over three
//! communicator scopes (group, group leaders, whole pool).
//!
//! ## Architecture
//!
//! - **Transport** ([`transport`], [`world`]) - Blocking ordered point-to-point delivery
//! - **Pools and Groups** ([`pool`], [`group`]) - Membership, ranks, and group assignment
//! - **Collectives** ([`comms`]) - Broadcasts, reductions, assembly, and shared decisions
//! - **Work Division** ([`strategy`]) - Strategies and loop partitioning helpers
//! - **Shared Randomness** ([`random`]) - Buffered random streams consistent within a scope
//! - **Error Handling** ([`error`]) - Failures of pool setup and communication
//!
//! Collectives must be entered by every participant of the scope in the same order.
//! Messages carry the tag of their scope, so a mismatched call surfaces as
//! [`error::PoolError::Desynchronised`] instead of silently pairing the wrong data.

pub mod comms;
pub mod error;
pub mod group;
pub mod pool;
pub mod random;
pub mod strategy;
pub mod transport;
pub mod world;
