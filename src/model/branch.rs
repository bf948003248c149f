//! Branch-scale opening model

use crate::engine::branch::{BranchContext, BranchModel};
use crate::engine::params::BranchState;

/// Alveolar recruitment driven by transmural pressure
///
/// A closed branch whose upstream connection is open (or which has none)
/// grows by `zeta * T^3 * R * (P - P_ip - P_th) * dt` while that driving
/// pressure is positive. Reaching `v_max` clamps the volume and opens it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryTreeBranch;

impl BranchModel for BinaryTreeBranch {
    fn time_step(&self, state: &mut BranchState, ctx: &BranchContext<'_>) {
        let upstream_open = ctx.upstream().map_or(true, |upstream| upstream.is_open);
        if !upstream_open || state.is_open {
            return;
        }

        let organ = ctx.organ();
        let drive = organ.p - organ.p_ip - state.p_th;
        if drive > 0.0 {
            let zeta = ctx.global().map_or(0.0, |g| g.zeta);
            state.v += zeta * state.t.powi(3) * state.r * drive * ctx.external().dt;
        }

        if state.v > state.v_max {
            state.v = state.v_max;
            state.is_open = true;
        }
    }
}
