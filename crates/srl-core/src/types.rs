//! Common types used throughout SRL

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SafeRlError;

/// Identifier of one training run (one process, one controller set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Algorithm variants known to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlgorithmKind {
    #[serde(rename = "PPO")]
    Ppo,
    #[serde(rename = "PPOLag")]
    PpoLag,
    #[serde(rename = "NaturalPG")]
    NaturalPg,
    #[serde(rename = "RCPO")]
    Rcpo,
    #[serde(rename = "TRPO")]
    Trpo,
    #[serde(rename = "TRPOPid")]
    TrpoPid,
    #[serde(rename = "SAC")]
    Sac,
    #[serde(rename = "SACPid")]
    SacPid,
    #[serde(rename = "PPOEarlyTerminated")]
    PpoEarlyTerminated,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 9] = [
        AlgorithmKind::Ppo,
        AlgorithmKind::PpoLag,
        AlgorithmKind::NaturalPg,
        AlgorithmKind::Rcpo,
        AlgorithmKind::Trpo,
        AlgorithmKind::TrpoPid,
        AlgorithmKind::Sac,
        AlgorithmKind::SacPid,
        AlgorithmKind::PpoEarlyTerminated,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AlgorithmKind::Ppo => "PPO",
            AlgorithmKind::PpoLag => "PPOLag",
            AlgorithmKind::NaturalPg => "NaturalPG",
            AlgorithmKind::Rcpo => "RCPO",
            AlgorithmKind::Trpo => "TRPO",
            AlgorithmKind::TrpoPid => "TRPOPid",
            AlgorithmKind::Sac => "SAC",
            AlgorithmKind::SacPid => "SACPid",
            AlgorithmKind::PpoEarlyTerminated => "PPOEarlyTerminated",
        }
    }

    /// Policy-optimization family this variant builds on
    pub fn base(self) -> BaseAlgorithm {
        match self {
            AlgorithmKind::Ppo | AlgorithmKind::PpoLag | AlgorithmKind::PpoEarlyTerminated => {
                BaseAlgorithm::Ppo
            }
            AlgorithmKind::NaturalPg | AlgorithmKind::Rcpo => BaseAlgorithm::NaturalPg,
            AlgorithmKind::Trpo | AlgorithmKind::TrpoPid => BaseAlgorithm::Trpo,
            AlgorithmKind::Sac | AlgorithmKind::SacPid => BaseAlgorithm::Sac,
        }
    }

    /// Penalty controller this variant owns
    pub fn controller(self) -> ControllerKind {
        match self {
            AlgorithmKind::PpoLag | AlgorithmKind::Rcpo => ControllerKind::Lagrange,
            AlgorithmKind::TrpoPid | AlgorithmKind::SacPid => ControllerKind::PidLagrange,
            AlgorithmKind::Ppo
            | AlgorithmKind::NaturalPg
            | AlgorithmKind::Trpo
            | AlgorithmKind::Sac
            | AlgorithmKind::PpoEarlyTerminated => ControllerKind::None,
        }
    }

    pub fn is_off_policy(self) -> bool {
        self.base() == BaseAlgorithm::Sac
    }
}

impl std::fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmKind {
    type Err = SafeRlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlgorithmKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SafeRlError::UnknownAlgorithm(s.to_string()))
    }
}

/// Base policy-optimization family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseAlgorithm {
    Ppo,
    NaturalPg,
    Trpo,
    Sac,
}

/// Which penalty controller an algorithm carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    None,
    Lagrange,
    PidLagrange,
}

/// Environment family the ensemble was trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvType {
    /// Ensemble predicts state only (plus reward for planners)
    #[serde(rename = "gym")]
    Gym,
    /// Ensemble predicts reward, cost and state
    #[serde(rename = "mujoco-velocity")]
    MujocoVelocity,
}

impl EnvType {
    /// Whether ensemble outputs carry a cost column
    pub fn models_cost(self) -> bool {
        matches!(self, EnvType::MujocoVelocity)
    }
}

impl std::fmt::Display for EnvType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvType::Gym => write!(f, "gym"),
            EnvType::MujocoVelocity => write!(f, "mujoco-velocity"),
        }
    }
}

impl FromStr for EnvType {
    type Err = SafeRlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gym" => Ok(EnvType::Gym),
            "mujoco-velocity" => Ok(EnvType::MujocoVelocity),
            other => Err(SafeRlError::config(format!("unknown env type '{other}'"))),
        }
    }
}

/// Model-based algorithm driving the virtual environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanningAlgo {
    #[serde(rename = "MBPPOLag")]
    MbPpoLag,
    #[serde(rename = "CAP")]
    Cap,
    #[serde(rename = "SafeLOOP")]
    SafeLoop,
}

impl PlanningAlgo {
    /// First output column holding state deltas.
    ///
    /// Columns before this offset hold reward (and cost for
    /// `mujoco-velocity`).
    pub fn state_start_dim(self, env_type: EnvType) -> usize {
        match (env_type, self) {
            (EnvType::Gym, PlanningAlgo::MbPpoLag) => 0,
            (EnvType::Gym, PlanningAlgo::Cap | PlanningAlgo::SafeLoop) => 1,
            (EnvType::MujocoVelocity, _) => 2,
        }
    }
}

impl std::fmt::Display for PlanningAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanningAlgo::MbPpoLag => write!(f, "MBPPOLag"),
            PlanningAlgo::Cap => write!(f, "CAP"),
            PlanningAlgo::SafeLoop => write!(f, "SafeLOOP"),
        }
    }
}

impl FromStr for PlanningAlgo {
    type Err = SafeRlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MBPPOLag" => Ok(PlanningAlgo::MbPpoLag),
            "CAP" => Ok(PlanningAlgo::Cap),
            "SafeLOOP" => Ok(PlanningAlgo::SafeLoop),
            other => Err(SafeRlError::config(format!(
                "unknown planning algorithm '{other}'"
            ))),
        }
    }
}

/// Optimizer used for the Lagrange multiplier ascent step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LambdaOptimizerKind {
    Sgd,
    #[default]
    Adam,
}
