//! Algorithm registry - maps an algorithm kind to the factory that builds it

use std::collections::HashMap;

use tracing::{debug, info};

use srl_core::{AlgorithmConfig, AlgorithmKind, Result, SafeRlError};

use crate::algorithm::ConstrainedAlgorithm;

/// Builds an algorithm from configuration
pub type AlgorithmFactory = fn(&AlgorithmConfig) -> Result<ConstrainedAlgorithm>;

/// Explicit table of available algorithms, built once and passed around
pub struct AlgorithmRegistry {
    factories: HashMap<AlgorithmKind, AlgorithmFactory>,
}

impl AlgorithmRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in variant
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(AlgorithmKind::Ppo, ppo);
        registry.register(AlgorithmKind::PpoLag, ppo_lag);
        registry.register(AlgorithmKind::NaturalPg, natural_pg);
        registry.register(AlgorithmKind::Rcpo, rcpo);
        registry.register(AlgorithmKind::Trpo, trpo);
        registry.register(AlgorithmKind::TrpoPid, trpo_pid);
        registry.register(AlgorithmKind::Sac, sac);
        registry.register(AlgorithmKind::SacPid, sac_pid);
        registry.register(AlgorithmKind::PpoEarlyTerminated, ppo_early_terminated);

        info!(count = registry.factories.len(), "algorithm registry initialized");
        registry
    }

    /// Add or replace the factory for `kind`
    pub fn register(&mut self, kind: AlgorithmKind, factory: AlgorithmFactory) {
        if self.factories.insert(kind, factory).is_some() {
            debug!(algorithm = %kind, "factory replaced");
        }
    }

    pub fn contains(&self, kind: AlgorithmKind) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn build(&self, kind: AlgorithmKind, config: &AlgorithmConfig) -> Result<ConstrainedAlgorithm> {
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| SafeRlError::UnknownAlgorithm(kind.to_string()))?;
        factory(config)
    }

    /// Build the kind named in `config`
    pub fn build_from_config(&self, config: &AlgorithmConfig) -> Result<ConstrainedAlgorithm> {
        self.build(config.kind, config)
    }

    pub fn build_by_name(&self, name: &str, config: &AlgorithmConfig) -> Result<ConstrainedAlgorithm> {
        let kind: AlgorithmKind = name.parse()?;
        self.build(kind, config)
    }

    /// Registered kinds in declaration order
    pub fn list(&self) -> Vec<AlgorithmKind> {
        let mut kinds: Vec<_> = self.factories.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn ppo(config: &AlgorithmConfig) -> Result<ConstrainedAlgorithm> {
    ConstrainedAlgorithm::with_kind(AlgorithmKind::Ppo, config)
}

fn ppo_lag(config: &AlgorithmConfig) -> Result<ConstrainedAlgorithm> {
    ConstrainedAlgorithm::with_kind(AlgorithmKind::PpoLag, config)
}

fn natural_pg(config: &AlgorithmConfig) -> Result<ConstrainedAlgorithm> {
    ConstrainedAlgorithm::with_kind(AlgorithmKind::NaturalPg, config)
}

fn rcpo(config: &AlgorithmConfig) -> Result<ConstrainedAlgorithm> {
    ConstrainedAlgorithm::with_kind(AlgorithmKind::Rcpo, config)
}

fn trpo(config: &AlgorithmConfig) -> Result<ConstrainedAlgorithm> {
    ConstrainedAlgorithm::with_kind(AlgorithmKind::Trpo, config)
}

fn trpo_pid(config: &AlgorithmConfig) -> Result<ConstrainedAlgorithm> {
    ConstrainedAlgorithm::with_kind(AlgorithmKind::TrpoPid, config)
}

fn sac(config: &AlgorithmConfig) -> Result<ConstrainedAlgorithm> {
    ConstrainedAlgorithm::with_kind(AlgorithmKind::Sac, config)
}

fn sac_pid(config: &AlgorithmConfig) -> Result<ConstrainedAlgorithm> {
    ConstrainedAlgorithm::with_kind(AlgorithmKind::SacPid, config)
}

// Early termination lives in the environment wrapper; the optimizer is plain PPO
fn ppo_early_terminated(config: &AlgorithmConfig) -> Result<ConstrainedAlgorithm> {
    ConstrainedAlgorithm::with_kind(AlgorithmKind::PpoEarlyTerminated, config)
}
