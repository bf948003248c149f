//! Binary-tree lung model
//!
//! Collapsible alveolar branches hang off a rigid trachea. A closed branch
//! starts filling once its upstream branch is open and the transmural
//! pressure exceeds its opening threshold; it opens when it reaches its
//! geometric volume.

pub mod branch;
pub mod lung;
pub mod scenario;

pub use branch::BinaryTreeBranch;
pub use lung::BinaryTreeLung;
pub use scenario::{build_binary_tree, build_lung, build_two_branch, run_scenario, ForcingSchedule};
