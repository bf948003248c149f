//! Lung-scale model

use crate::core::config::{ExternalConfig, GlobalBranchConfig};
use crate::engine::organ::{Engine, Organ};
use crate::engine::params::StepInput;
use crate::model::branch::BinaryTreeBranch;

/// Whole-lung pressure, volume and flow on top of [`BinaryTreeBranch`]es
#[derive(Debug)]
pub struct BinaryTreeLung {
    engine: Engine<BinaryTreeBranch>,
}

impl BinaryTreeLung {
    /// Create an empty lung at its initial pressures and cavity volume
    pub fn new(external: ExternalConfig, global: Option<GlobalBranchConfig>) -> Self {
        let mut engine = Engine::new(BinaryTreeBranch, external, global);
        let (p, p_ip, v_ip) = {
            let external = engine.external();
            (external.p_init, external.p_ip_init, external.v_ip_init)
        };
        let organ = engine.organ_mut();
        organ.p = p;
        organ.p_ip = p_ip;
        organ.v_ip = v_ip;
        Self { engine }
    }
}

impl Organ for BinaryTreeLung {
    type Model = BinaryTreeBranch;

    fn engine(&self) -> &Engine<BinaryTreeBranch> {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut Engine<BinaryTreeBranch> {
        &mut self.engine
    }

    fn step(&mut self, input: &StepInput) {
        let engine = &mut self.engine;
        let dt = engine.external().dt;
        let omega = engine.external().omega;

        // Boyle's law for the expanding intrapleural cavity
        if input.v_ip > 0.0 {
            let organ = engine.organ_mut();
            let old_v_ip = organ.v_ip;
            organ.v_ip = input.v_ip;
            organ.p_ip = (organ.p_ip + 1.0) * old_v_ip / organ.v_ip - 1.0;
        } else {
            tracing::warn!(v_ip = input.v_ip, "non-positive cavity volume ignored");
        }

        let old_v = engine.organ().v;
        engine.update_branches(input);

        let organ = engine.organ_mut();
        let v = organ.v;
        if v > 0.0 {
            // Alveolar pressure after the volume change, before any airflow
            organ.p = (organ.p + 1.0) * old_v / v - 1.0;

            // Only the static airways contribute resistance
            let resistance = omega + dt / v;
            organ.q = -organ.p / resistance;
            organ.dp = organ.p;

            // Inflow equilibrates the pressure
            organ.p += organ.q * dt / v;
        }

        engine.record_history();
    }
}
