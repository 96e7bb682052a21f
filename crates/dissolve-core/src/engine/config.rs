use crate::core::forcefield::potentials::LennardJones;
use crate::parallel::random::DEFAULT_BUFFER_SIZE;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid configuration in '{path}': {source}")]
    Invalid { path: String, source: ConfigError },
}

/// Parameters of the molecule shake Monte Carlo move.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShakeConfig {
    pub shakes_per_molecule: usize,
    /// Maximum translation per trial, in Å.
    pub translation_step: f64,
    pub translation_step_min: f64,
    pub translation_step_max: f64,
    /// Maximum rotation per trial, in degrees.
    pub rotation_step: f64,
    pub rotation_step_min: f64,
    pub rotation_step_max: f64,
    pub target_acceptance_rate: f64,
    /// Temperature in K.
    pub temperature: f64,
}

impl Default for ShakeConfig {
    fn default() -> Self {
        Self {
            shakes_per_molecule: 1,
            translation_step: 0.05,
            translation_step_min: 0.001,
            translation_step_max: 3.0,
            rotation_step: 20.0,
            rotation_step_min: 0.01,
            rotation_step_max: 90.0,
            target_acceptance_rate: 0.33,
            temperature: 300.0,
        }
    }
}

impl ShakeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.shakes_per_molecule == 0 {
            return Err(invalid("shakes_per_molecule", "must be at least 1"));
        }
        check_step(
            "translation_step",
            self.translation_step,
            self.translation_step_min,
            self.translation_step_max,
        )?;
        check_step(
            "rotation_step",
            self.rotation_step,
            self.rotation_step_min,
            self.rotation_step_max,
        )?;
        if !(self.target_acceptance_rate > 0.0 && self.target_acceptance_rate < 1.0) {
            return Err(invalid(
                "target_acceptance_rate",
                "must lie strictly between 0 and 1",
            ));
        }
        check_positive("temperature", self.temperature)
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(name, format!("{value} is not a positive number")))
    }
}

fn check_step(name: &'static str, step: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    check_positive(name, step)?;
    check_positive(name, min)?;
    if !(min <= step && step <= max) {
        return Err(invalid(
            name,
            format!("{step} lies outside its limits [{min}, {max}]"),
        ));
    }
    Ok(())
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

/// Everything needed to build a configuration's cell array and run a shake over it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Requested cell edge length, in Å.
    pub cell_size: f64,
    /// Pair interaction cutoff, in Å.
    pub cutoff: f64,
    /// Number of process groups to split the pool into; `None` keeps one process per group.
    #[serde(default)]
    pub process_groups: Option<usize>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_buffer_size")]
    pub random_buffer_size: usize,
    #[serde(default)]
    pub potential: LennardJones,
    #[serde(default)]
    pub shake: ShakeConfig,
}

impl SimulationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let display = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io {
            path: display.clone(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigLoadError::Toml {
            path: display.clone(),
            source: e,
        })?;
        config.validate().map_err(|e| ConfigLoadError::Invalid {
            path: display,
            source: e,
        })?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("cell_size", self.cell_size)?;
        check_positive("cutoff", self.cutoff)?;
        if self.process_groups == Some(0) {
            return Err(invalid("process_groups", "must be at least 1"));
        }
        if self.random_buffer_size == 0 {
            return Err(invalid("random_buffer_size", "must be at least 1"));
        }
        check_positive("potential.epsilon", self.potential.epsilon)?;
        check_positive("potential.sigma", self.potential.sigma)?;
        self.shake.validate()
    }
}

#[derive(Default)]
pub struct SimulationConfigBuilder {
    cell_size: Option<f64>,
    cutoff: Option<f64>,
    process_groups: Option<usize>,
    seed: Option<u64>,
    random_buffer_size: Option<usize>,
    potential: Option<LennardJones>,
    shake: Option<ShakeConfig>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell_size(mut self, size: f64) -> Self {
        self.cell_size = Some(size);
        self
    }
    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }
    pub fn process_groups(mut self, n: usize) -> Self {
        self.process_groups = Some(n);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn random_buffer_size(mut self, size: usize) -> Self {
        self.random_buffer_size = Some(size);
        self
    }
    pub fn potential(mut self, potential: LennardJones) -> Self {
        self.potential = Some(potential);
        self
    }
    pub fn shake(mut self, shake: ShakeConfig) -> Self {
        self.shake = Some(shake);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let config = SimulationConfig {
            cell_size: self
                .cell_size
                .ok_or(ConfigError::MissingParameter("cell_size"))?,
            cutoff: self.cutoff.ok_or(ConfigError::MissingParameter("cutoff"))?,
            process_groups: self.process_groups,
            seed: self.seed.unwrap_or_default(),
            random_buffer_size: self.random_buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            potential: self.potential.unwrap_or_default(),
            shake: self.shake.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}
