//! End-to-end tests for the binary-tree lung
//!
//! Two-branch lung (rigid trachea + one collapsible layer), 100 steps,
//! history at every step.

use openlung::core::config::{ExternalConfig, GlobalBranchConfig, ScenarioConfig};
use openlung::core::error::LungError;
use openlung::engine::{Organ, StepInput};
use openlung::model::{build_two_branch, run_scenario, BinaryTreeLung};

fn two_branch_lung() -> BinaryTreeLung {
    let external = ExternalConfig {
        branch_capacity: 2,
        ..ExternalConfig::default()
    };
    let mut lung = BinaryTreeLung::new(external, Some(GlobalBranchConfig::default()));
    lung.engine_mut().track_history(1, false);
    lung
}

#[test]
fn test_constant_forcing_approaches_asymptote() {
    let mut lung = two_branch_lung();
    let (trachea, alveolus) = build_two_branch(&mut lung).unwrap();

    let input = StepInput { v_ip: 1.0 };
    for _ in 0..100 {
        lung.step(&input);
    }

    let engine = lung.engine();
    let v_trachea = engine.branch(trachea).unwrap().state().v;
    let v_alveolus = engine.branch(alveolus).unwrap().state().v;
    assert!((lung.organ_state().v - (v_trachea + v_alveolus)).abs() < 1e-9);
    assert_eq!(v_trachea, 150.0);
    assert!(v_alveolus > 0.0);
    assert!(!engine.branch(alveolus).unwrap().state().is_open);

    let history = lung.history();
    assert_eq!(history.len(), 100);

    // With the cavity held still, filling stops once P reaches P_ip + P_th = -0.4
    let pressures: Vec<f64> = history.organ_states().map(|o| o.p).collect();
    assert!(pressures.iter().all(|&p| p < 0.0 && p > -0.4));
    assert!(
        pressures.windows(2).all(|w| w[1] < w[0]),
        "pressure should fall monotonically"
    );
    let decrements: Vec<f64> = pressures.windows(2).map(|w| w[0] - w[1]).collect();
    assert!(
        decrements.windows(2).all(|w| w[1] < w[0]),
        "pressure should approach its asymptote with shrinking decrements"
    );

    let volumes: Vec<f64> = history.organ_states().map(|o| o.v).collect();
    assert!(volumes.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn test_expanding_cavity_scenario() {
    let scenario = ScenarioConfig::default();
    let lung = run_scenario(&scenario).unwrap();

    let history = lung.history();
    assert_eq!(history.len(), 100);

    let now = history.back(0).unwrap();
    let then = history.back(20).unwrap();
    assert_eq!(now.step, 100);
    assert_eq!(then.step, 80);
    assert!(now.organ.p < then.organ.p);
    assert!(history.first().unwrap().organ.v < now.organ.v);

    // Intrapleural pressure follows Boyle's law for the cavity alone
    let organ = lung.organ_state();
    let expected_p_ip = 0.5 * 1.0 / organ.v_ip - 1.0;
    assert!((organ.p_ip - expected_p_ip).abs() < 1e-9);
}

#[test]
fn test_scenario_file_runs() {
    let path =
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("data/scenarios/two_branch.toml");
    let scenario = ScenarioConfig::load(&path).unwrap();
    assert_eq!(scenario.run.threads, 4);

    let parallel = run_scenario(&scenario).unwrap();
    let serial = run_scenario(&ScenarioConfig::default()).unwrap();
    assert_eq!(parallel.organ_state(), serial.organ_state());
}

#[test]
fn test_structure_loading_is_reported_unimplemented() {
    let mut lung = two_branch_lung();
    build_two_branch(&mut lung).unwrap();
    let before = lung.organ_state().clone();

    let result = lung.load_structure(&mut std::io::empty());

    assert!(matches!(result, Err(LungError::Unimplemented(_))));
    assert_eq!(lung.engine().branch_count(), 2);
    assert_eq!(lung.organ_state(), &before);
}
