//! Simulation configuration with documented constants
//!
//! The defaults reproduce the two-branch example lung: a rigid trachea
//! feeding one collapsible alveolar layer, driven by an exponentially
//! expanding intrapleural cavity.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{LungError, Result};

/// Simulation-wide constants supplied once at engine construction
///
/// Never mutated after the engine is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    /// Time-step size (seconds)
    ///
    /// Every volume and flow increment is scaled by this value, so halving
    /// it roughly doubles the number of steps needed for the same trajectory.
    pub dt: f64,

    /// Initial alveolar pressure, relative to atmospheric
    pub p_init: f64,

    /// Initial intrapleural pressure, relative to atmospheric
    ///
    /// Negative values hold the lung open against its own recoil.
    pub p_ip_init: f64,

    /// Initial intrapleural cavity volume
    ///
    /// Must be positive: the intrapleural pressure update divides by it.
    pub v_ip_init: f64,

    /// Baseline airway resistance of the static (non-collapsible) airways
    pub omega: f64,

    /// Expected number of branches
    ///
    /// Used to reserve branch storage up front. Exceeding it is allowed,
    /// branches are addressed by handle, not by memory location.
    pub branch_capacity: usize,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            dt: 1e-3,
            p_init: 0.0,
            p_ip_init: -0.5,
            v_ip_init: 1.0,
            omega: 1.0,
            branch_capacity: 2,
        }
    }
}

impl ExternalConfig {
    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0) {
            return Err(LungError::InvalidConfig(format!(
                "dt ({}) must be positive",
                self.dt
            )));
        }
        if !(self.v_ip_init > 0.0) {
            return Err(LungError::InvalidConfig(format!(
                "v_ip_init ({}) must be positive",
                self.v_ip_init
            )));
        }
        if !(self.omega > 0.0) {
            return Err(LungError::InvalidConfig(format!(
                "omega ({}) must be positive",
                self.omega
            )));
        }
        Ok(())
    }
}

/// Constants shared by every branch of one model instantiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalBranchConfig {
    /// Wall compliance coefficient of the opening equation
    pub zeta: f64,
}

impl Default for GlobalBranchConfig {
    fn default() -> Self {
        Self { zeta: 1e5 }
    }
}

impl GlobalBranchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.zeta < 0.0 {
            return Err(LungError::InvalidConfig(format!(
                "zeta ({}) must not be negative",
                self.zeta
            )));
        }
        Ok(())
    }
}

/// How long to run and what to record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub steps: usize,
    /// Record one history snapshot every `history_rate` steps (0 = never)
    pub history_rate: u32,
    /// Also copy every branch state into each snapshot
    ///
    /// Memory grows with branches x snapshots; keep it off for large trees.
    pub detailed_history: bool,
    /// Worker count for parallel branch updates (0 = serial)
    pub threads: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            steps: 100,
            history_rate: 1,
            detailed_history: false,
            threads: 0,
        }
    }
}

/// Kelvin-Voigt expansion of the intrapleural cavity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForcingConfig {
    /// Relative strain the cavity approaches asymptotically
    pub sigma_0: f64,
    /// Relaxation time of the expansion
    pub tau_ip: f64,
}

impl Default for ForcingConfig {
    fn default() -> Self {
        Self {
            sigma_0: 100.0,
            tau_ip: 1.0,
        }
    }
}

/// Generated symmetric binary tree instead of the two-branch example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Number of collapsible layers below the trachea
    pub depth: u32,
    /// Seed for the per-branch threshold jitter
    pub seed: u64,
}

/// Complete scenario as loaded by the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub external: ExternalConfig,
    pub global: Option<GlobalBranchConfig>,
    pub run: RunConfig,
    pub forcing: ForcingConfig,
    pub tree: Option<TreeConfig>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            external: ExternalConfig::default(),
            global: Some(GlobalBranchConfig::default()),
            run: RunConfig::default(),
            forcing: ForcingConfig::default(),
            tree: None,
        }
    }
}

impl ScenarioConfig {
    /// Load a scenario from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse a scenario from a TOML string and validate it
    pub fn parse_toml(content: &str) -> Result<Self> {
        let scenario: ScenarioConfig = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        self.external.validate()?;
        if let Some(global) = &self.global {
            global.validate()?;
        }
        if !(self.forcing.tau_ip > 0.0) {
            return Err(LungError::InvalidConfig(format!(
                "tau_ip ({}) must be positive",
                self.forcing.tau_ip
            )));
        }
        if let Some(tree) = &self.tree {
            if tree.depth > 20 {
                return Err(LungError::InvalidConfig(format!(
                    "tree depth {} would allocate more than 2^21 branches",
                    tree.depth
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ScenarioConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_dt() {
        let config = ExternalConfig {
            dt: 0.0,
            ..ExternalConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LungError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_zero_cavity_volume() {
        let config = ExternalConfig {
            v_ip_init: 0.0,
            ..ExternalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml_uses_defaults() {
        let toml_str = r#"
            [external]
            dt = 0.01
            branch_capacity = 8

            [run]
            steps = 50
            threads = 2
        "#;
        let scenario = ScenarioConfig::parse_toml(toml_str).unwrap();
        assert_eq!(scenario.external.dt, 0.01);
        assert_eq!(scenario.external.branch_capacity, 8);
        assert_eq!(scenario.external.omega, 1.0);
        assert_eq!(scenario.run.steps, 50);
        assert_eq!(scenario.run.threads, 2);
        assert_eq!(scenario.run.history_rate, 1);
        assert_eq!(scenario.global, Some(GlobalBranchConfig::default()));
        assert!(scenario.tree.is_none());
    }

    #[test]
    fn test_parse_tree_section() {
        let toml_str = r#"
            [tree]
            depth = 4
            seed = 42
        "#;
        let scenario = ScenarioConfig::parse_toml(toml_str).unwrap();
        assert_eq!(scenario.tree, Some(TreeConfig { depth: 4, seed: 42 }));
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        let toml_str = r#"
            [forcing]
            tau_ip = -1.0
        "#;
        assert!(matches!(
            ScenarioConfig::parse_toml(toml_str),
            Err(LungError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_toml() {
        assert!(matches!(
            ScenarioConfig::parse_toml("[external\ndt = "),
            Err(LungError::TomlError(_))
        ));
    }

    #[test]
    fn test_load_missing_file_reports_io_error() {
        let result = ScenarioConfig::load(Path::new("data/scenarios/does_not_exist.toml"));
        assert!(matches!(result, Err(LungError::IoError(_))));
    }
}
