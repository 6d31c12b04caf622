//! Algorithm variants - a base policy-gradient kind composed with a penalty controller

use ndarray::{Array1, ArrayView1, Zip};
use serde::Serialize;
use tracing::{debug, info};

use srl_core::{AlgorithmConfig, AlgorithmKind, BaseAlgorithm, Result, SafeRlError};

use crate::controller::Controller;
use crate::logger::{EpochLogger, MetricsSink, EP_COST_KEY};

/// A safe-RL algorithm: base optimizer kind plus the controller it owns
#[derive(Debug, Clone, Serialize)]
pub struct ConstrainedAlgorithm {
    kind: AlgorithmKind,
    controller: Controller,
    clip_ratio: f64,
    entropy_coef: f64,
}

impl ConstrainedAlgorithm {
    pub fn new(config: &AlgorithmConfig) -> Result<Self> {
        Self::with_kind(config.kind, config)
    }

    /// Build `kind` with the remaining settings taken from `config`
    pub fn with_kind(kind: AlgorithmKind, config: &AlgorithmConfig) -> Result<Self> {
        config.validate()?;
        let controller = Controller::from_config(kind.controller(), config)?;

        info!(
            algorithm = %kind,
            controller = ?controller.kind(),
            cost_limit = config.cost_limit,
            "algorithm initialized"
        );

        Ok(Self {
            kind,
            controller,
            clip_ratio: config.clip_ratio,
            entropy_coef: config.entropy_coef,
        })
    }

    pub fn kind(&self) -> AlgorithmKind {
        self.kind
    }

    pub fn base(&self) -> BaseAlgorithm {
        self.kind.base()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    /// Current penalty weight; 0 for unconstrained kinds
    pub fn penalty(&self) -> f64 {
        self.controller.current_penalty()
    }

    /// Feed the epoch's mean episodic cost to the controller.
    ///
    /// Runs before the policy update for on-policy constrained kinds. The
    /// off-policy PID variant updates inside [`Self::sac_actor_loss`], so
    /// here it only reports the current penalty.
    pub fn update_penalty(&mut self, logger: &EpochLogger) -> Result<f64> {
        if !self.controller.is_constrained() || self.kind.is_off_policy() {
            return Ok(self.penalty());
        }

        let observed = logger
            .get_stats(EP_COST_KEY)
            .ok_or_else(|| SafeRlError::MissingMetric(EP_COST_KEY.to_string()))?
            .mean;
        let penalty = self.controller.update(observed)?;
        debug!(algorithm = %self.kind, observed, penalty, "penalty updated");
        Ok(penalty)
    }

    /// Combine reward and cost advantages into the advantage the policy maximizes
    pub fn compute_surrogate(
        &self,
        adv: ArrayView1<'_, f64>,
        cost_adv: ArrayView1<'_, f64>,
    ) -> Result<Array1<f64>> {
        check_len("cost_adv", adv.len(), cost_adv.len())?;
        if !self.controller.is_constrained() {
            return Ok(adv.to_owned());
        }

        let p = self.penalty();
        Ok(Zip::from(&adv)
            .and(&cost_adv)
            .map_collect(|&a, &c| (a - p * c) / (1.0 + p)))
    }

    /// On-policy actor loss on the surrogate advantage
    pub fn policy_loss(
        &self,
        ratio: ArrayView1<'_, f64>,
        adv: ArrayView1<'_, f64>,
        cost_adv: ArrayView1<'_, f64>,
        entropy: ArrayView1<'_, f64>,
    ) -> Result<f64> {
        check_len("ratio", adv.len(), ratio.len())?;
        check_len("entropy", adv.len(), entropy.len())?;
        if adv.is_empty() {
            return Err(SafeRlError::shape("policy loss needs a non-empty batch"));
        }

        let surrogate = self.compute_surrogate(adv, cost_adv)?;
        let n = surrogate.len() as f64;

        let objective = match self.base() {
            BaseAlgorithm::Ppo => {
                let (lo, hi) = (1.0 - self.clip_ratio, 1.0 + self.clip_ratio);
                Zip::from(&ratio)
                    .and(&surrogate)
                    .fold(0.0, |acc, &r, &a| acc + (r * a).min(r.clamp(lo, hi) * a))
                    / n
            }
            BaseAlgorithm::Trpo | BaseAlgorithm::NaturalPg => ratio.dot(&surrogate) / n,
            BaseAlgorithm::Sac => {
                return Err(SafeRlError::Model(format!(
                    "{} has no on-policy actor loss",
                    self.kind
                )))
            }
        };
        let mean_entropy = entropy.sum() / n;

        Ok(-objective - self.entropy_coef * mean_entropy)
    }

    /// Soft actor-critic actor loss.
    ///
    /// Per sample `L = min(q1, q2) - alpha * log_prob`. The PID variant
    /// penalizes `relu(cost_q - cost_limit)`, updating its controller with the
    /// batch mean first, and normalizes by `1 + penalty`.
    pub fn sac_actor_loss(
        &mut self,
        q1: ArrayView1<'_, f64>,
        q2: ArrayView1<'_, f64>,
        log_prob: ArrayView1<'_, f64>,
        alpha: f64,
        cost_q: Option<ArrayView1<'_, f64>>,
        sink: &mut dyn MetricsSink,
    ) -> Result<f64> {
        if self.base() != BaseAlgorithm::Sac {
            return Err(SafeRlError::Model(format!(
                "{} is not an off-policy algorithm",
                self.kind
            )));
        }
        check_len("q2", q1.len(), q2.len())?;
        check_len("log_prob", q1.len(), log_prob.len())?;
        if q1.is_empty() {
            return Err(SafeRlError::shape("actor loss needs a non-empty batch"));
        }
        let n = q1.len() as f64;

        let mut loss = Zip::from(&q1)
            .and(&q2)
            .and(&log_prob)
            .map_collect(|&a, &b, &lp| a.min(b) - alpha * lp);

        if let Some(limit) = self.controller.limit() {
            let cost_q = cost_q.ok_or_else(|| {
                SafeRlError::Model(format!("{} actor loss needs cost Q values", self.kind))
            })?;
            check_len("cost_q", q1.len(), cost_q.len())?;
            if let Some(bad) = cost_q.iter().find(|c| !c.is_finite()) {
                return Err(SafeRlError::NonFiniteCost(*bad));
            }

            let excess = cost_q.mapv(|c| (c - limit).max(0.0));
            let mean_excess = excess.sum() / n;
            let p = self.controller.update(mean_excess)?;

            Zip::from(&mut loss)
                .and(&excess)
                .for_each(|l, &c| *l = (*l - p * c) / (1.0 + p));
            sink.store("Loss/Loss_pi_c", mean_excess);
        }

        sink.store("Misc/LogPi", log_prob.sum() / n);
        sink.store("Misc/Alpha", alpha);

        Ok(-loss.sum() / n)
    }

    /// Keys this algorithm writes each epoch
    pub fn metric_keys(&self) -> Vec<&'static str> {
        let mut keys = self.controller.metric_keys().to_vec();
        if self.kind == AlgorithmKind::SacPid {
            keys.extend(["Loss/Loss_pi_c", "Misc/CostLimit"]);
        }
        keys
    }

    pub fn register_keys(&self, logger: &mut EpochLogger) {
        logger.register_key(EP_COST_KEY);
        for key in self.metric_keys() {
            logger.register_key(key);
        }
    }

    /// Per-epoch values specific to this variant
    pub fn algorithm_specific_logs(&self, sink: &mut dyn MetricsSink) {
        self.controller.log_metrics(sink);
        if self.kind == AlgorithmKind::SacPid {
            if let Some(limit) = self.controller.limit() {
                sink.store("Misc/CostLimit", limit);
            }
        }
    }
}

fn check_len(name: &str, expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(SafeRlError::shape(format!(
            "{name} has length {got}, expected {expected}"
        )))
    }
}
