pub mod config;
pub mod error;
pub mod types;

pub use config::{ExternalConfig, GlobalBranchConfig, ScenarioConfig};
pub use error::{LungError, Result};
pub use types::{BranchId, Step};
