use super::pool::CommunicatorType;
use super::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoolError {
    #[error("World rank {world_rank} is not a member of pool '{pool}'")]
    NotInPool { pool: String, world_rank: usize },

    #[error("Invalid pool definition: {0}")]
    InvalidRanks(String),

    #[error("Process groups of pool '{0}' are fixed and cannot be reassigned")]
    GroupsFixed(String),

    #[error("This process does not take part in the {0:?} communicator")]
    NotInScope(CommunicatorType),

    #[error("Rank {rank} is outside the {comm:?} communicator of {size} processes")]
    RankOutOfScope {
        comm: CommunicatorType,
        rank: usize,
        size: usize,
    },

    #[error("Transport failure: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },

    #[error("Expected {expected} values but received {received}")]
    LengthMismatch { expected: usize, received: usize },

    #[error("Destination holds {capacity} items but {needed} are required")]
    Capacity { needed: usize, capacity: usize },

    #[error("Expected a {expected} payload but received {received}")]
    TypeMismatch {
        expected: &'static str,
        received: &'static str,
    },

    #[error("Collective operations out of step: {0}")]
    Desynchronised(String),
}
