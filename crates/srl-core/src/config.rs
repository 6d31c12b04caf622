//! Configuration for SRL runs
//!
//! Every section deserializes with defaults so a partial `srl.toml` is
//! enough. Values are checked by the `validate` methods, which the
//! controllers also call when they are constructed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::SafeRlError;
use crate::types::{AlgorithmKind, EnvType, LambdaOptimizerKind, PlanningAlgo};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run: RunConfig,
    pub algorithm: AlgorithmConfig,
    pub virtual_env: VirtualEnvConfig,
    pub ensemble: EnsembleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub seed: u64,
    pub log_level: String,
    pub epochs: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            log_level: "info".to_string(),
            epochs: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmConfig {
    pub kind: AlgorithmKind,
    pub cost_limit: f64,
    pub clip_ratio: f64,
    pub entropy_coef: f64,
    pub lagrange: LagrangeConfig,
    pub pid: PidConfig,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            kind: AlgorithmKind::PpoLag,
            cost_limit: 25.0,
            clip_ratio: 0.2,
            entropy_coef: 0.0,
            lagrange: LagrangeConfig::default(),
            pid: PidConfig::default(),
        }
    }
}

impl AlgorithmConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if !self.cost_limit.is_finite() {
            return Err(SafeRlError::config(format!(
                "cost_limit must be finite, got {}",
                self.cost_limit
            )));
        }
        if !(self.clip_ratio.is_finite() && self.clip_ratio >= 0.0) {
            return Err(SafeRlError::config(format!(
                "clip_ratio must be a non-negative number, got {}",
                self.clip_ratio
            )));
        }
        if !self.entropy_coef.is_finite() {
            return Err(SafeRlError::config("entropy_coef must be finite"));
        }
        self.lagrange.validate()?;
        self.pid.validate()
    }
}

/// Gradient-ascent Lagrange multiplier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LagrangeConfig {
    pub multiplier_init: f64,
    pub lambda_lr: f64,
    pub lambda_optimizer: LambdaOptimizerKind,
    pub upper_bound: Option<f64>,
}

impl Default for LagrangeConfig {
    fn default() -> Self {
        Self {
            multiplier_init: 0.001,
            lambda_lr: 0.035,
            lambda_optimizer: LambdaOptimizerKind::Adam,
            upper_bound: None,
        }
    }
}

impl LagrangeConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if !self.multiplier_init.is_finite() {
            return Err(SafeRlError::config("multiplier_init must be finite"));
        }
        if !(self.lambda_lr.is_finite() && self.lambda_lr >= 0.0) {
            return Err(SafeRlError::config(format!(
                "lambda_lr must be a non-negative number, got {}",
                self.lambda_lr
            )));
        }
        check_bound("upper_bound", self.upper_bound)
    }
}

/// PID-Lagrangian controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub integral_init: f64,
    /// Anti-windup ceiling for the accumulated error; unbounded when unset.
    pub integral_max: Option<f64>,
    /// Number of updates the derivative term looks back over.
    pub d_delay: usize,
    pub delta_p_ema_alpha: f64,
    pub delta_d_ema_alpha: f64,
    pub penalty_max: Option<f64>,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 0.1,
            ki: 0.01,
            kd: 0.01,
            integral_init: 0.0,
            integral_max: None,
            d_delay: 10,
            delta_p_ema_alpha: 0.95,
            delta_d_ema_alpha: 0.95,
            penalty_max: Some(100.0),
        }
    }
}

impl PidConfig {
    pub fn validate(&self) -> crate::Result<()> {
        for (name, gain) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            if !(gain.is_finite() && gain >= 0.0) {
                return Err(SafeRlError::config(format!(
                    "PID gain {name} must be a non-negative number, got {gain}"
                )));
            }
        }
        if !(self.integral_init.is_finite() && self.integral_init >= 0.0) {
            return Err(SafeRlError::config(format!(
                "integral_init must be non-negative, got {}",
                self.integral_init
            )));
        }
        check_bound("integral_max", self.integral_max)?;
        check_bound("penalty_max", self.penalty_max)?;
        if self.d_delay == 0 {
            return Err(SafeRlError::config("d_delay must be at least 1"));
        }
        for (name, alpha) in [
            ("delta_p_ema_alpha", self.delta_p_ema_alpha),
            ("delta_d_ema_alpha", self.delta_d_ema_alpha),
        ] {
            if !(0.0..1.0).contains(&alpha) {
                return Err(SafeRlError::config(format!(
                    "{name} must lie in [0, 1), got {alpha}"
                )));
            }
        }
        Ok(())
    }
}

fn check_bound(name: &str, bound: Option<f64>) -> crate::Result<()> {
    match bound {
        Some(b) if !(b >= 0.0) => Err(SafeRlError::config(format!(
            "{name} must be non-negative, got {b}"
        ))),
        _ => Ok(()),
    }
}

/// Virtual environment wiring for model-based rollouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualEnvConfig {
    pub algo: PlanningAlgo,
    pub env_type: EnvType,
    pub env_name: String,
}

impl Default for VirtualEnvConfig {
    fn default() -> Self {
        Self {
            algo: PlanningAlgo::MbPpoLag,
            env_type: EnvType::MujocoVelocity,
            env_name: "Hopper-v2".to_string(),
        }
    }
}

/// Shape of the synthetic ensemble used by the CLI rollout command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub num_members: usize,
    pub num_elites: usize,
    pub obs_dim: usize,
    pub act_dim: usize,
    pub noise_std: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            num_members: 7,
            num_elites: 5,
            obs_dim: 11,
            act_dim: 3,
            noise_std: 0.05,
        }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.num_members == 0 {
            return Err(SafeRlError::config("num_members must be at least 1"));
        }
        if self.num_elites == 0 || self.num_elites > self.num_members {
            return Err(SafeRlError::config(format!(
                "num_elites must lie in 1..={}, got {}",
                self.num_members, self.num_elites
            )));
        }
        if !(self.noise_std.is_finite() && self.noise_std > 0.0) {
            return Err(SafeRlError::config("noise_std must be positive"));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        Self::load_from(Self::find_config_file().as_deref())
    }

    /// Load configuration from an explicit file (if any) plus `SRL__` env overrides
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = path {
            tracing::info!("Loading config from: {:?}", path);
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        } else {
            tracing::info!("No config file found, using defaults");
        }

        // SRL__ALGORITHM__COST_LIMIT=10 overrides algorithm.cost_limit
        builder = builder.add_source(
            Environment::with_prefix("SRL")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.algorithm.validate()?;
        self.ensemble.validate()
    }

    /// Find the configuration file
    pub fn find_config_file() -> Option<PathBuf> {
        // Check in order: SRL_CONFIG env, ./srl.toml, ~/.config/srl/srl.toml
        if let Ok(path) = std::env::var("SRL_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("srl.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("srl").join("srl.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }
}
