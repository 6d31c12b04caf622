//! Penalty controllers for constrained policy optimization

use serde::Serialize;

use srl_core::{AlgorithmConfig, ControllerKind, Result, SafeRlError};

use crate::logger::MetricsSink;

pub mod lagrange;
pub mod pid;

pub use lagrange::{project, LagrangeController};
pub use pid::PidLagrangian;

/// Controller that turns observed episodic cost into a penalty weight
pub trait PenaltyController {
    /// Feed one observed average episodic cost, return the new penalty.
    ///
    /// A non-finite cost is rejected and leaves the controller untouched.
    fn update(&mut self, observed_cost: f64) -> Result<f64>;

    fn current_penalty(&self) -> f64;

    fn cost_limit(&self) -> f64;

    fn log_metrics(&self, sink: &mut dyn MetricsSink);
}

pub(crate) fn ensure_finite(observed_cost: f64) -> Result<()> {
    if observed_cost.is_finite() {
        Ok(())
    } else {
        Err(SafeRlError::NonFiniteCost(observed_cost))
    }
}

/// Controller owned by an algorithm, selected by [`ControllerKind`]
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Controller {
    Unconstrained,
    Lagrange(LagrangeController),
    Pid(PidLagrangian),
}

impl Controller {
    pub fn from_config(kind: ControllerKind, config: &AlgorithmConfig) -> Result<Self> {
        Ok(match kind {
            ControllerKind::None => Controller::Unconstrained,
            ControllerKind::Lagrange => {
                Controller::Lagrange(LagrangeController::new(config.cost_limit, &config.lagrange)?)
            }
            ControllerKind::PidLagrange => {
                Controller::Pid(PidLagrangian::new(config.cost_limit, &config.pid)?)
            }
        })
    }

    pub fn kind(&self) -> ControllerKind {
        match self {
            Controller::Unconstrained => ControllerKind::None,
            Controller::Lagrange(_) => ControllerKind::Lagrange,
            Controller::Pid(_) => ControllerKind::PidLagrange,
        }
    }

    pub fn is_constrained(&self) -> bool {
        !matches!(self, Controller::Unconstrained)
    }

    /// Cost limit, `None` when no constraint is enforced
    pub fn limit(&self) -> Option<f64> {
        match self {
            Controller::Unconstrained => None,
            Controller::Lagrange(c) => Some(c.cost_limit()),
            Controller::Pid(c) => Some(c.cost_limit()),
        }
    }

    pub fn update(&mut self, observed_cost: f64) -> Result<f64> {
        match self {
            Controller::Unconstrained => Ok(0.0),
            Controller::Lagrange(c) => c.update(observed_cost),
            Controller::Pid(c) => c.update(observed_cost),
        }
    }

    pub fn current_penalty(&self) -> f64 {
        match self {
            Controller::Unconstrained => 0.0,
            Controller::Lagrange(c) => c.current_penalty(),
            Controller::Pid(c) => c.current_penalty(),
        }
    }

    pub fn log_metrics(&self, sink: &mut dyn MetricsSink) {
        match self {
            Controller::Unconstrained => {}
            Controller::Lagrange(c) => c.log_metrics(sink),
            Controller::Pid(c) => c.log_metrics(sink),
        }
    }

    /// Keys written by [`Controller::log_metrics`]
    pub fn metric_keys(&self) -> &'static [&'static str] {
        match self {
            Controller::Unconstrained => &[],
            Controller::Lagrange(_) => &["Metrics/LagrangeMultiplier"],
            Controller::Pid(_) => &[
                "Metrics/LagrangeMultiplier",
                "PID/pid_Kp",
                "PID/pid_Ki",
                "PID/pid_Kd",
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::EpochLogger;

    #[test]
    fn test_from_config_selects_variant() {
        let config = AlgorithmConfig::default();
        let none = Controller::from_config(ControllerKind::None, &config).unwrap();
        let lag = Controller::from_config(ControllerKind::Lagrange, &config).unwrap();
        let pid = Controller::from_config(ControllerKind::PidLagrange, &config).unwrap();

        assert_eq!(none.kind(), ControllerKind::None);
        assert_eq!(lag.kind(), ControllerKind::Lagrange);
        assert_eq!(pid.kind(), ControllerKind::PidLagrange);
        assert!(!none.is_constrained());
        assert_eq!(lag.limit(), Some(25.0));
    }

    #[test]
    fn test_unconstrained_penalty_is_zero() {
        let mut ctrl = Controller::Unconstrained;
        assert_eq!(ctrl.update(1000.0).unwrap(), 0.0);
        assert_eq!(ctrl.current_penalty(), 0.0);
        assert_eq!(ctrl.limit(), None);
    }

    #[test]
    fn test_non_finite_cost_rejected_by_every_constrained_variant() {
        let config = AlgorithmConfig::default();
        for kind in [ControllerKind::Lagrange, ControllerKind::PidLagrange] {
            let mut ctrl = Controller::from_config(kind, &config).unwrap();
            ctrl.update(40.0).unwrap();
            let before = ctrl.current_penalty();
            for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                let err = ctrl.update(bad).unwrap_err();
                assert!(matches!(err, SafeRlError::NonFiniteCost(_)), "{kind:?}: {err}");
            }
            assert_eq!(ctrl.current_penalty(), before);
        }
    }

    #[test]
    fn test_log_metrics_match_keys() {
        let config = AlgorithmConfig::default();
        let pid = Controller::from_config(ControllerKind::PidLagrange, &config).unwrap();
        let mut logger = EpochLogger::new();
        pid.log_metrics(&mut logger);

        for key in pid.metric_keys() {
            assert!(logger.get_stats(key).is_some(), "missing {key}");
        }
        assert_eq!(logger.get_stats("PID/pid_Kp").unwrap().mean, 0.1);
    }
}
