//! Model-based rollout: ensemble dynamics, likelihood scoring and termination

pub mod ensemble;
pub mod likelihood;
pub mod termination;
pub mod virtual_env;

pub use ensemble::{EnsembleModel, LinearGaussianEnsemble, LinearMember};
pub use likelihood::log_likelihood;
pub use termination::{termination_fn, TerminationRule};
pub use virtual_env::{BatchedPrediction, GaussianSlice, SingleStep, StepOutcome, VirtualEnv};
