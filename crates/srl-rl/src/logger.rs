//! Epoch logger - named scalar metrics collected per training epoch

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Key under which the driver stores the observed average episodic cost
pub const EP_COST_KEY: &str = "Metrics/EpCost";

/// Write-only sink for named scalar metrics
pub trait MetricsSink {
    fn store(&mut self, key: &str, value: f64);
}

/// Summary statistics of one key over the current epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Stats {
    fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            std: var.sqrt(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Snapshot emitted at the end of an epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub timestamp: DateTime<Utc>,
    pub metrics: BTreeMap<String, Stats>,
}

/// In-memory epoch logger
#[derive(Debug, Default)]
pub struct EpochLogger {
    registered: BTreeSet<String>,
    epoch_values: BTreeMap<String, Vec<f64>>,
}

impl EpochLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a key that will be stored during the epoch
    pub fn register_key(&mut self, key: &str) {
        self.registered.insert(key.to_string());
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.registered.contains(key)
    }

    pub fn registered_keys(&self) -> impl Iterator<Item = &str> {
        self.registered.iter().map(String::as_str)
    }

    /// Statistics of everything stored under `key` since the last dump
    pub fn get_stats(&self, key: &str) -> Option<Stats> {
        self.epoch_values
            .get(key)
            .and_then(|values| Stats::from_values(values))
    }

    /// Close the epoch: summarize, log, and clear stored values
    pub fn dump_epoch(&mut self, epoch: usize) -> EpochSummary {
        let metrics: BTreeMap<String, Stats> = self
            .epoch_values
            .iter()
            .filter_map(|(key, values)| Stats::from_values(values).map(|s| (key.clone(), s)))
            .collect();

        for (key, stats) in &metrics {
            info!(epoch, key = %key, mean = stats.mean, std = stats.std, "epoch metric");
        }

        self.epoch_values.clear();

        EpochSummary {
            epoch,
            timestamp: Utc::now(),
            metrics,
        }
    }
}

impl MetricsSink for EpochLogger {
    fn store(&mut self, key: &str, value: f64) {
        if !self.registered.contains(key) {
            warn!(key, "storing metric under unregistered key");
            self.registered.insert(key.to_string());
        }
        self.epoch_values
            .entry(key.to_string())
            .or_default()
            .push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_stats() {
        let mut logger = EpochLogger::new();
        logger.register_key(EP_COST_KEY);
        logger.store(EP_COST_KEY, 10.0);
        logger.store(EP_COST_KEY, 30.0);

        let stats = logger.get_stats(EP_COST_KEY).unwrap();
        assert_eq!(stats.mean, 20.0);
        assert_eq!(stats.std, 10.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
    }

    #[test]
    fn test_missing_key_has_no_stats() {
        let logger = EpochLogger::new();
        assert!(logger.get_stats("Metrics/EpRet").is_none());
    }

    #[test]
    fn test_unregistered_store_registers() {
        let mut logger = EpochLogger::new();
        logger.store("Loss/Loss_pi", 1.5);
        assert!(logger.is_registered("Loss/Loss_pi"));
    }

    #[test]
    fn test_dump_epoch_clears_values() {
        let mut logger = EpochLogger::new();
        logger.register_key(EP_COST_KEY);
        logger.store(EP_COST_KEY, 4.0);

        let summary = logger.dump_epoch(3);
        assert_eq!(summary.epoch, 3);
        assert_eq!(summary.metrics[EP_COST_KEY].mean, 4.0);

        assert!(logger.get_stats(EP_COST_KEY).is_none());
        // registration survives the dump
        assert!(logger.is_registered(EP_COST_KEY));
    }

    #[test]
    fn test_summary_serialization() {
        let mut logger = EpochLogger::new();
        logger.store("Metrics/LagrangeMultiplier", 0.25);
        let summary = logger.dump_epoch(0);

        let json = serde_json::to_string(&summary).unwrap();
        let parsed: EpochSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.metrics["Metrics/LagrangeMultiplier"].max, 0.25);
    }
}
