//! Parameter records shared by the engine and the branch models
//!
//! Plain data with a handful of derived-field rules. Nothing here knows
//! about the branch graph.

use std::f64::consts::PI;

/// Externally driven forcing for a single step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepInput {
    /// Target intrapleural cavity volume at the end of the step
    ///
    /// Must be positive; organs keep the previous cavity state otherwise.
    pub v_ip: f64,
}

/// Per-branch physical quantities
///
/// `v_max` and `is_open` are derived: [`BranchState::init`] recomputes them
/// from the primary fields and the static flag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BranchState {
    /// Radius
    pub r: f64,
    /// Length
    pub l: f64,
    /// Wall thickness
    pub t: f64,
    /// Current volume
    pub v: f64,
    pub v_max: f64,
    /// Opening threshold pressure
    pub p_th: f64,
    pub layer_id: i16,
    pub is_open: bool,
    /// Rigid branches keep their volume and are always open
    pub is_static: bool,
}

impl BranchState {
    /// A collapsible branch; call [`BranchState::init`] (or add it to an
    /// engine, which does) before reading derived fields.
    pub fn new(r: f64, l: f64, t: f64, v: f64, p_th: f64, layer_id: i16) -> Self {
        Self {
            r,
            l,
            t,
            v,
            p_th,
            layer_id,
            ..Self::default()
        }
    }

    /// A rigid branch of fixed volume
    pub fn rigid(v: f64, layer_id: i16) -> Self {
        Self {
            v,
            layer_id,
            is_static: true,
            ..Self::default()
        }
    }

    /// Volume of the fully opened cylinder
    pub fn geometric_volume(&self) -> f64 {
        PI * self.r * self.r * self.l
    }

    /// Clamp the volume into `[0, geometric_volume]` and derive the open flag
    pub fn validate_volume(&mut self) {
        let full = self.geometric_volume();
        if self.v >= full {
            self.v = full;
            self.is_open = true;
        } else if self.v <= 0.0 {
            self.v = 0.0;
            self.is_open = false;
        } else {
            self.is_open = false;
        }
    }

    pub fn set_max_volume(&mut self) {
        if self.is_static {
            self.v_max = self.v;
            self.is_open = true;
        } else {
            self.v_max = self.geometric_volume();
        }
    }

    /// Recompute every derived field from the primary ones
    pub fn init(&mut self) {
        if !self.is_static {
            self.validate_volume();
        }
        self.set_max_volume();
    }

    /// Mark the branch rigid or collapsible and re-derive its fields
    pub fn set_static(&mut self, is_static: bool) {
        self.is_static = is_static;
        self.init();
    }
}

/// Aggregate state of the whole organ
///
/// Only the engine and the organ model mutate this; branches see it read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganState {
    pub inhale: bool,
    /// Alveolar pressure
    pub p: f64,
    /// Total volume of all branches
    pub v: f64,
    /// Intermediate pressure before flow equilibration
    pub dp: f64,
    /// Airflow into the organ
    pub q: f64,
    pub v_max: f64,
    /// Volume held by rigid branches
    pub v_min: f64,
    /// Intrapleural pressure
    pub p_ip: f64,
    /// Intrapleural cavity volume
    pub v_ip: f64,
}

impl Default for OrganState {
    fn default() -> Self {
        Self {
            inhale: true,
            p: 0.0,
            v: 0.0,
            dp: 0.0,
            q: 0.0,
            v_max: 0.0,
            v_min: 0.0,
            p_ip: 0.0,
            v_ip: 0.0,
        }
    }
}

impl OrganState {
    /// Account for a branch joining the organ
    pub fn add_branch_adjustments(&mut self, branch: &BranchState) {
        self.v += branch.v;
        self.v_max += branch.v_max;
        if branch.is_static {
            self.v_min += branch.v;
        }
    }

    /// Reverse [`OrganState::add_branch_adjustments`] for a leaving branch
    pub fn remove_branch_adjustments(&mut self, branch: &BranchState) {
        self.v -= branch.v;
        self.v_max -= branch.v_max;
        if branch.is_static {
            self.v_min -= branch.v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapsible_branch_init_clamps_negative_volume() {
        let mut branch = BranchState::new(10.0, 10.0, 0.1, -3.0, 0.1, 1);
        branch.init();
        assert_eq!(branch.v, 0.0);
        assert!(!branch.is_open);
        assert!((branch.v_max - PI * 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_overfull_branch_opens_at_geometric_volume() {
        let mut branch = BranchState::new(1.0, 2.0, 0.1, 100.0, 0.0, 1);
        branch.init();
        assert!((branch.v - 2.0 * PI).abs() < 1e-12);
        assert!(branch.is_open);
        assert_eq!(branch.v, branch.v_max);
    }

    #[test]
    fn test_rigid_branch_keeps_volume_and_is_open() {
        let mut branch = BranchState::rigid(150.0, 0);
        branch.init();
        assert_eq!(branch.v, 150.0);
        assert_eq!(branch.v_max, 150.0);
        assert!(branch.is_open);
    }

    #[test]
    fn test_set_static_rederives_fields() {
        let mut branch = BranchState::new(1.0, 1.0, 0.1, 1.0, 0.0, 1);
        branch.init();
        assert!(!branch.is_open);
        assert!((branch.v_max - PI).abs() < 1e-12);

        branch.set_static(true);
        assert!(branch.is_open);
        assert_eq!(branch.v_max, 1.0);

        branch.set_static(false);
        assert!(!branch.is_open);
        assert!((branch.v_max - PI).abs() < 1e-12);
    }

    #[test]
    fn test_add_then_remove_adjustments_cancel() {
        let mut rigid = BranchState::rigid(150.0, 0);
        rigid.init();
        let mut organ = OrganState::default();
        organ.add_branch_adjustments(&rigid);
        assert_eq!(organ.v, 150.0);
        assert_eq!(organ.v_max, 150.0);
        assert_eq!(organ.v_min, 150.0);

        organ.remove_branch_adjustments(&rigid);
        assert_eq!(organ.v, 0.0);
        assert_eq!(organ.v_max, 0.0);
        assert_eq!(organ.v_min, 0.0);
    }

    #[test]
    fn test_collapsible_branch_does_not_count_towards_min_volume() {
        let mut branch = BranchState::new(1.0, 1.0, 0.1, 0.5, 0.0, 1);
        branch.init();
        let mut organ = OrganState::default();
        organ.add_branch_adjustments(&branch);
        assert_eq!(organ.v_min, 0.0);
        assert_eq!(organ.v, 0.5);
    }
}
