//! Generic branch-network simulation engine
//!
//! - [`params`]: parameter records (branch, organ, per-step input)
//! - [`branch`]: branches, connections and the [`BranchModel`] capability
//! - [`dispatch`]: serial and partitioned-parallel branch passes
//! - [`history`]: sampled history recording
//! - [`organ`]: the [`Engine`] container and the [`Organ`] capability

pub mod branch;
pub mod dispatch;
pub mod history;
pub mod organ;
pub mod params;

pub use branch::{Branch, BranchContext, BranchModel, StepContext};
pub use dispatch::{partition, UpdateStrategy};
pub use history::{HistoryLog, HistoryRecorder, HistorySnapshot};
pub use organ::{Engine, Organ};
pub use params::{BranchState, OrganState, StepInput};
