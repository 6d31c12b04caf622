//! Lagrange multiplier updated by gradient ascent on constraint violation

use serde::Serialize;
use tracing::debug;

use srl_core::{LagrangeConfig, LambdaOptimizerKind, Result, SafeRlError};

use super::{ensure_finite, PenaltyController};
use crate::logger::MetricsSink;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

/// Projection of a raw multiplier onto the feasible half-line `[0, inf)`
#[inline]
pub fn project(x: f64) -> f64 {
    x.max(0.0)
}

#[derive(Debug, Clone, Serialize)]
enum LambdaOptimizer {
    Sgd,
    Adam { m: f64, v: f64, t: i32 },
}

impl LambdaOptimizer {
    fn new(kind: LambdaOptimizerKind) -> Self {
        match kind {
            LambdaOptimizerKind::Sgd => LambdaOptimizer::Sgd,
            LambdaOptimizerKind::Adam => LambdaOptimizer::Adam { m: 0.0, v: 0.0, t: 0 },
        }
    }

    /// Parameter delta for one descent step on `grad`
    fn step(&mut self, grad: f64, lr: f64) -> f64 {
        match self {
            LambdaOptimizer::Sgd => -lr * grad,
            LambdaOptimizer::Adam { m, v, t } => {
                *t += 1;
                *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * grad;
                *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * grad * grad;
                let m_hat = *m / (1.0 - ADAM_BETA1.powi(*t));
                let v_hat = *v / (1.0 - ADAM_BETA2.powi(*t));
                -lr * m_hat / (v_hat.sqrt() + ADAM_EPS)
            }
        }
    }
}

/// Learnable Lagrange multiplier for `reward s.t. cost <= cost_limit`
#[derive(Debug, Clone, Serialize)]
pub struct LagrangeController {
    cost_limit: f64,
    multiplier: f64,
    lambda_lr: f64,
    upper_bound: Option<f64>,
    optimizer: LambdaOptimizer,
}

impl LagrangeController {
    pub fn new(cost_limit: f64, config: &LagrangeConfig) -> Result<Self> {
        if !cost_limit.is_finite() {
            return Err(SafeRlError::config(format!(
                "cost_limit must be finite, got {cost_limit}"
            )));
        }
        config.validate()?;

        let mut multiplier = project(config.multiplier_init);
        if let Some(upper) = config.upper_bound {
            multiplier = multiplier.min(upper);
        }

        debug!(cost_limit, multiplier, lr = config.lambda_lr, "lagrange controller created");

        Ok(Self {
            cost_limit,
            multiplier,
            lambda_lr: config.lambda_lr,
            upper_bound: config.upper_bound,
            optimizer: LambdaOptimizer::new(config.lambda_optimizer),
        })
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn lambda_lr(&self) -> f64 {
        self.lambda_lr
    }

    /// Loss whose descent is ascent on the multiplier: `-lambda * (Jc - limit)`
    pub fn lambda_loss(&self, observed_cost: f64) -> f64 {
        -self.multiplier * (observed_cost - self.cost_limit)
    }
}

impl PenaltyController for LagrangeController {
    fn update(&mut self, observed_cost: f64) -> Result<f64> {
        ensure_finite(observed_cost)?;
        let violation = observed_cost - self.cost_limit;
        // d(lambda_loss)/d(lambda)
        let grad = -violation;
        let raw = self.multiplier + self.optimizer.step(grad, self.lambda_lr);

        let mut multiplier = project(raw);
        if let Some(upper) = self.upper_bound {
            multiplier = multiplier.min(upper);
        }
        self.multiplier = multiplier;

        debug!(observed_cost, violation, multiplier, "lagrange multiplier updated");
        Ok(multiplier)
    }

    fn current_penalty(&self) -> f64 {
        self.multiplier
    }

    fn cost_limit(&self) -> f64 {
        self.cost_limit
    }

    fn log_metrics(&self, sink: &mut dyn MetricsSink) {
        sink.store("Metrics/LagrangeMultiplier", self.multiplier);
    }
}
