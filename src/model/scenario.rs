//! Scenario wiring: forcing schedule and branch layouts
//!
//! Everything a driver needs to go from a [`ScenarioConfig`] to a running
//! [`BinaryTreeLung`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::config::{ExternalConfig, ForcingConfig, ScenarioConfig};
use crate::core::error::Result;
use crate::core::types::BranchId;
use crate::engine::organ::Organ;
use crate::engine::params::{BranchState, StepInput};
use crate::model::lung::BinaryTreeLung;

/// Volume of the rigid trachea
const TRACHEA_VOLUME: f64 = 150.0;

/// Per-layer shrink factor of radius and length in generated trees
const LAYER_SCALE: f64 = 0.8;

/// Kelvin-Voigt expansion of the intrapleural cavity
///
/// `V_ip(i) = V_ip0 + sigma_0 * V_ip0 * (1 - exp(-i * dt / tau_ip))`.
/// Infinite; bound it with `take`.
#[derive(Debug, Clone)]
pub struct ForcingSchedule {
    v_ip_init: f64,
    sigma_0: f64,
    tau_ip: f64,
    dt: f64,
    step: usize,
}

impl ForcingSchedule {
    pub fn new(external: &ExternalConfig, forcing: &ForcingConfig) -> Self {
        Self {
            v_ip_init: external.v_ip_init,
            sigma_0: forcing.sigma_0,
            tau_ip: forcing.tau_ip,
            dt: external.dt,
            step: 0,
        }
    }

    pub fn v_ip_at(&self, step: usize) -> f64 {
        let t = step as f64 * self.dt;
        self.v_ip_init + self.sigma_0 * self.v_ip_init * (1.0 - (-t / self.tau_ip).exp())
    }
}

impl Iterator for ForcingSchedule {
    type Item = StepInput;

    fn next(&mut self) -> Option<StepInput> {
        let input = StepInput {
            v_ip: self.v_ip_at(self.step),
        };
        self.step += 1;
        Some(input)
    }
}

/// Rigid trachea plus one collapsible alveolar layer
///
/// Returns `(trachea, alveolus)`.
pub fn build_two_branch(lung: &mut BinaryTreeLung) -> Result<(BranchId, BranchId)> {
    let engine = lung.engine_mut();
    let trachea = engine.add_branch(BranchState::rigid(TRACHEA_VOLUME, 0), &[])?;
    let alveolus = engine.add_branch(BranchState::new(10.0, 10.0, 0.1, 0.0, 0.1, 1), &[trachea])?;
    Ok((trachea, alveolus))
}

/// Rigid trachea with `depth` layers of bifurcating collapsible branches
///
/// Each branch connects to its parent. Deeper layers are smaller and need
/// a larger transmural pressure to fill; thresholds carry a seeded ±10%
/// jitter. Returns all ids in insertion order, trachea first.
pub fn build_binary_tree(
    lung: &mut BinaryTreeLung,
    depth: u32,
    seed: u64,
) -> Result<Vec<BranchId>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let engine = lung.engine_mut();

    let trachea = engine.add_branch(BranchState::rigid(TRACHEA_VOLUME, 0), &[])?;
    let mut ids = vec![trachea];
    let mut parents = vec![trachea];

    for layer in 1..=depth {
        let scale = LAYER_SCALE.powi(layer as i32);
        let mut children = Vec::with_capacity(parents.len() * 2);
        for &parent in &parents {
            for _ in 0..2 {
                let jitter: f64 = rng.gen_range(0.9..1.1);
                let state = BranchState::new(
                    10.0 * scale,
                    10.0 * scale,
                    0.1,
                    0.0,
                    0.1 * f64::from(layer) * jitter,
                    layer as i16,
                );
                children.push(engine.add_branch(state, &[parent])?);
            }
        }
        ids.extend_from_slice(&children);
        parents = children;
    }

    tracing::debug!(depth, branches = ids.len(), "binary tree built");
    Ok(ids)
}

/// Build the lung a scenario describes, without stepping it
pub fn build_lung(scenario: &ScenarioConfig) -> Result<BinaryTreeLung> {
    scenario.validate()?;

    let mut external = scenario.external.clone();
    if let Some(tree) = &scenario.tree {
        let needed = (1usize << (tree.depth + 1)) - 1;
        external.branch_capacity = external.branch_capacity.max(needed);
    }

    let mut lung = BinaryTreeLung::new(external, scenario.global.clone());
    lung.engine_mut()
        .track_history(scenario.run.history_rate, scenario.run.detailed_history);
    lung.engine_mut().use_threading(scenario.run.threads)?;

    match &scenario.tree {
        Some(tree) => {
            build_binary_tree(&mut lung, tree.depth, tree.seed)?;
        }
        None => {
            build_two_branch(&mut lung)?;
        }
    }
    Ok(lung)
}

/// Build the scenario's lung and step it `run.steps` times
pub fn run_scenario(scenario: &ScenarioConfig) -> Result<BinaryTreeLung> {
    let mut lung = build_lung(scenario)?;
    let schedule = ForcingSchedule::new(lung.engine().external(), &scenario.forcing);

    tracing::info!(
        steps = scenario.run.steps,
        branches = lung.engine().branch_count(),
        workers = lung.engine().strategy().workers(),
        "running scenario"
    );
    lung.run(schedule.take(scenario.run.steps));

    let organ = lung.organ_state();
    tracing::info!(
        p = organ.p,
        v = organ.v,
        recorded = lung.history().len(),
        "scenario finished"
    );
    Ok(lung)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{RunConfig, TreeConfig};
    use crate::core::error::LungError;

    #[test]
    fn test_forcing_starts_at_initial_volume() {
        let schedule = ForcingSchedule::new(&ExternalConfig::default(), &ForcingConfig::default());
        assert_eq!(schedule.v_ip_at(0), 1.0);
    }

    #[test]
    fn test_forcing_is_increasing_and_bounded() {
        let schedule = ForcingSchedule::new(&ExternalConfig::default(), &ForcingConfig::default());
        let volumes: Vec<f64> = schedule.take(500).map(|input| input.v_ip).collect();
        assert!(volumes.windows(2).all(|w| w[1] > w[0]));
        // Asymptote is V_ip0 * (1 + sigma_0)
        assert!(volumes.iter().all(|&v| v < 101.0));
    }

    #[test]
    fn test_two_branch_layout() {
        let mut lung = BinaryTreeLung::new(ExternalConfig::default(), Some(Default::default()));
        let (trachea, alveolus) = build_two_branch(&mut lung).unwrap();
        let engine = lung.engine();
        assert_eq!(engine.branch_count(), 2);
        assert!(engine.branch(trachea).unwrap().state().is_static);
        assert_eq!(engine.branch(alveolus).unwrap().connections(), &[trachea]);
        assert_eq!(engine.organ().v, 150.0);
    }

    #[test]
    fn test_binary_tree_shape() {
        let mut lung = BinaryTreeLung::new(ExternalConfig::default(), Some(Default::default()));
        let ids = build_binary_tree(&mut lung, 3, 7).unwrap();
        assert_eq!(ids.len(), 15);

        let engine = lung.engine();
        let leaf = *ids.last().unwrap();
        assert_eq!(engine.branch(leaf).unwrap().state().layer_id, 3);
        assert_eq!(engine.connection_of_order(3, leaf).unwrap(), Some(ids[0]));
        assert_eq!(engine.connection_of_order(4, leaf).unwrap(), None);
    }

    #[test]
    fn test_binary_tree_is_seed_deterministic() {
        let thresholds = |seed| {
            let mut lung = BinaryTreeLung::new(ExternalConfig::default(), Some(Default::default()));
            build_binary_tree(&mut lung, 2, seed).unwrap();
            lung.engine()
                .branches()
                .iter()
                .map(|b| b.state().p_th)
                .collect::<Vec<_>>()
        };
        assert_eq!(thresholds(11), thresholds(11));
        assert_ne!(thresholds(11), thresholds(12));
    }

    #[test]
    fn test_build_lung_reserves_for_tree() {
        let scenario = ScenarioConfig {
            tree: Some(TreeConfig { depth: 4, seed: 1 }),
            ..ScenarioConfig::default()
        };
        let lung = build_lung(&scenario).unwrap();
        assert_eq!(lung.engine().branch_count(), 31);
        assert_eq!(lung.engine().external().branch_capacity, 31);
    }

    #[test]
    fn test_build_lung_without_global_config_fails() {
        let scenario = ScenarioConfig {
            global: None,
            ..ScenarioConfig::default()
        };
        assert!(matches!(build_lung(&scenario), Err(LungError::MissingGlobalConfig)));
    }

    #[test]
    fn test_run_scenario_records_history() {
        let scenario = ScenarioConfig {
            run: RunConfig {
                steps: 40,
                history_rate: 4,
                detailed_history: true,
                threads: 2,
            },
            ..ScenarioConfig::default()
        };
        let lung = run_scenario(&scenario).unwrap();
        assert_eq!(lung.engine().steps(), 40);
        assert_eq!(lung.history().len(), 10);
        let last = lung.history().last().unwrap();
        assert_eq!(last.branches.as_ref().map(Vec::len), Some(2));
    }
}
