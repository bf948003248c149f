//! Core type definitions used throughout the codebase

use derive_more::Display;

/// Stable handle to a branch owned by an [`Engine`](crate::engine::Engine)
///
/// Handles are handed out from a counter and never reused by the same engine,
/// so a handle to a removed branch stays invalid instead of silently
/// resolving to a newer branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "branch#{}", _0)]
pub struct BranchId(pub u32);

/// Simulation step counter
pub type Step = u64;
