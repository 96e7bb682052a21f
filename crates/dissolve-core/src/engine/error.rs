use thiserror::Error;

use super::config::ConfigError;
use crate::core::spatial::error::SpatialError;
use crate::parallel::error::PoolError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Parallel communication failed: {source}")]
    Pool {
        #[from]
        source: PoolError,
    },

    #[error("Spatial operation failed: {source}")]
    Spatial {
        #[from]
        source: SpatialError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
