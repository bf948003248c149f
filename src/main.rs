//! OpenLung - scenario driver
//!
//! Loads a scenario (TOML, or the built-in two-branch example), runs it and
//! prints a short report from the recorded history.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use openlung::core::config::{ScenarioConfig, TreeConfig};
use openlung::core::error::Result;
use openlung::engine::Organ;
use openlung::model::run_scenario;

/// Run a lung inflation scenario
#[derive(Parser, Debug)]
#[command(name = "openlung")]
#[command(about = "Simulate alveolar recruitment in a branching lung model")]
struct Args {
    /// Scenario file (e.g. data/scenarios/two_branch.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Override the number of steps
    #[arg(long)]
    steps: Option<usize>,

    /// Override the worker count for branch updates (0 = serial)
    #[arg(long)]
    threads: Option<usize>,

    /// Override the history sampling rate (0 = no history)
    #[arg(long)]
    history_rate: Option<u32>,

    /// Record every branch state in each history snapshot
    #[arg(long)]
    detailed: bool,

    /// Replace the branch layout with a generated binary tree of this depth
    #[arg(long)]
    depth: Option<u32>,

    /// Seed for the generated tree
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("openlung=info")),
        )
        .init();

    let args = Args::parse();

    let mut scenario = match &args.config {
        Some(path) => ScenarioConfig::load(path)?,
        None => ScenarioConfig::default(),
    };
    if let Some(steps) = args.steps {
        scenario.run.steps = steps;
    }
    if let Some(threads) = args.threads {
        scenario.run.threads = threads;
    }
    if let Some(rate) = args.history_rate {
        scenario.run.history_rate = rate;
    }
    if args.detailed {
        scenario.run.detailed_history = true;
    }
    if let Some(depth) = args.depth {
        scenario.tree = Some(TreeConfig {
            depth,
            seed: args.seed,
        });
    }

    let lung = run_scenario(&scenario)?;
    report(&lung);
    Ok(())
}

fn report(lung: &impl Organ) {
    let engine = lung.engine();
    let history = lung.history();
    let open = engine
        .branches()
        .iter()
        .filter(|b| b.state().is_open)
        .count();

    println!("\n=== OPENLUNG ===");
    println!(
        "{} steps, {} branches ({} open), {} history entries",
        engine.steps(),
        engine.branch_count(),
        open,
        history.len()
    );

    let organ = lung.organ_state();
    println!(
        "Final: P = {:.6}, V = {:.4}, q = {:.6}, P_ip = {:.6}",
        organ.p, organ.v, organ.q, organ.p_ip
    );

    match (history.last(), history.back(20)) {
        (Some(now), Some(then)) => println!(
            "The current pressure is {:.6} and the pressure 20 recorded steps ago was {:.6}",
            now.organ.p, then.organ.p
        ),
        _ => println!("Not enough history to compare pressures over 20 recorded steps"),
    }
    if let (Some(first), Some(last)) = (history.first(), history.last()) {
        println!(
            "The volume after the first recorded step is {:.4} and the current volume is {:.4}",
            first.organ.v, last.organ.v
        );
    }
}
