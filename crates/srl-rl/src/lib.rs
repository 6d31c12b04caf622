//! SRL RL - constraint controllers, algorithm variants and model-based rollout
//!
//! Penalty controllers (Lagrange, PID-Lagrangian) turn observed episodic
//! cost into a penalty weight; algorithm variants compose a base policy
//! optimizer with one controller; the dynamics module produces synthetic
//! transitions from a trained ensemble.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithm;
pub mod controller;
pub mod dynamics;
pub mod logger;
pub mod registry;

pub use algorithm::ConstrainedAlgorithm;
pub use controller::{project, Controller, LagrangeController, PenaltyController, PidLagrangian};
pub use dynamics::{
    log_likelihood, termination_fn, EnsembleModel, LinearGaussianEnsemble, StepOutcome,
    VirtualEnv,
};
pub use logger::{EpochLogger, EpochSummary, MetricsSink, Stats, EP_COST_KEY};
pub use registry::{AlgorithmFactory, AlgorithmRegistry};
