use thiserror::Error;

use crate::core::types::BranchId;

#[derive(Error, Debug)]
pub enum LungError {
    #[error("Global branch configuration missing; use add_branch_with_global")]
    MissingGlobalConfig,

    #[error("Branch not found: {0}")]
    UnknownBranch(BranchId),

    #[error("Not implemented: {0}")]
    Unimplemented(&'static str),

    #[error("Connection walk from {from} did not terminate within {order} hops")]
    CyclicConnections { from: BranchId, order: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, LungError>;
