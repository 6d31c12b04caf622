//! PID-Lagrangian penalty controller
//!
//! The penalty is the output of a PID loop on the constraint violation
//! `observed_cost - cost_limit`:
//!
//! ```text
//! integral <- clamp(integral + error, 0, integral_max)
//! p        <- a_p * p + (1 - a_p) * error
//! c        <- a_d * c + (1 - a_d) * observed_cost
//! d         = c - c[t - d_delay]                (0 on the first update)
//! penalty   = min(max(0, kp * p + ki * integral + kd * d), penalty_max)
//! ```
//!
//! With `a_p = a_d = 0` and `d_delay = 1` this is the textbook PID on the
//! error signal, since the cost limit is constant and the cost difference
//! equals the error difference.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use srl_core::{PidConfig, Result, SafeRlError};

use super::{ensure_finite, PenaltyController};
use crate::logger::MetricsSink;

#[derive(Debug, Clone, Serialize)]
pub struct PidLagrangian {
    kp: f64,
    ki: f64,
    kd: f64,
    cost_limit: f64,
    integral_max: f64,
    d_delay: usize,
    delta_p_ema_alpha: f64,
    delta_d_ema_alpha: f64,
    penalty_max: Option<f64>,

    integral_error: f64,
    delta_p: f64,
    smoothed_cost: Option<f64>,
    cost_history: VecDeque<f64>,
    last_error: Option<f64>,
    cost_penalty: f64,
}

impl PidLagrangian {
    pub fn new(cost_limit: f64, config: &PidConfig) -> Result<Self> {
        if !cost_limit.is_finite() {
            return Err(SafeRlError::config(format!(
                "cost_limit must be finite, got {cost_limit}"
            )));
        }
        config.validate()?;

        let integral_max = config.integral_max.unwrap_or(f64::INFINITY);
        let integral_error = config.integral_init.min(integral_max);

        debug!(
            cost_limit,
            kp = config.kp,
            ki = config.ki,
            kd = config.kd,
            "pid lagrangian created"
        );

        let mut pid = Self {
            kp: config.kp,
            ki: config.ki,
            kd: config.kd,
            cost_limit,
            integral_max,
            d_delay: config.d_delay,
            delta_p_ema_alpha: config.delta_p_ema_alpha,
            delta_d_ema_alpha: config.delta_d_ema_alpha,
            penalty_max: config.penalty_max,
            integral_error,
            delta_p: 0.0,
            smoothed_cost: None,
            cost_history: VecDeque::with_capacity(config.d_delay + 1),
            last_error: None,
            cost_penalty: 0.0,
        };
        pid.cost_penalty = pid.bounded(pid.ki * integral_error);
        Ok(pid)
    }

    pub fn gains(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }

    pub fn integral_error(&self) -> f64 {
        self.integral_error
    }

    /// Error seen by the most recent update
    pub fn last_error(&self) -> Option<f64> {
        self.last_error
    }

    fn bounded(&self, raw: f64) -> f64 {
        let penalty = raw.max(0.0);
        match self.penalty_max {
            Some(max) => penalty.min(max),
            None => penalty,
        }
    }

    fn derivative(&mut self, observed_cost: f64) -> f64 {
        let a_d = self.delta_d_ema_alpha;
        let smoothed = match self.smoothed_cost {
            Some(prev) => a_d * prev + (1.0 - a_d) * observed_cost,
            None => observed_cost,
        };
        self.smoothed_cost = Some(smoothed);

        let derivative = self.cost_history.front().map_or(0.0, |old| smoothed - old);

        self.cost_history.push_back(smoothed);
        if self.cost_history.len() > self.d_delay {
            self.cost_history.pop_front();
        }
        derivative
    }
}

impl PenaltyController for PidLagrangian {
    fn update(&mut self, observed_cost: f64) -> Result<f64> {
        ensure_finite(observed_cost)?;
        let error = observed_cost - self.cost_limit;

        self.integral_error = (self.integral_error + error).clamp(0.0, self.integral_max);

        let a_p = self.delta_p_ema_alpha;
        self.delta_p = a_p * self.delta_p + (1.0 - a_p) * error;

        let derivative = self.derivative(observed_cost);

        let raw = self.kp * self.delta_p + self.ki * self.integral_error + self.kd * derivative;
        self.cost_penalty = self.bounded(raw);
        self.last_error = Some(error);

        debug!(
            observed_cost,
            error,
            integral = self.integral_error,
            derivative,
            penalty = self.cost_penalty,
            "pid penalty updated"
        );
        Ok(self.cost_penalty)
    }

    fn current_penalty(&self) -> f64 {
        self.cost_penalty
    }

    fn cost_limit(&self) -> f64 {
        self.cost_limit
    }

    fn log_metrics(&self, sink: &mut dyn MetricsSink) {
        sink.store("Metrics/LagrangeMultiplier", self.cost_penalty);
        sink.store("PID/pid_Kp", self.kp);
        sink.store("PID/pid_Ki", self.ki);
        sink.store("PID/pid_Kd", self.kd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(kp: f64, ki: f64, kd: f64) -> PidConfig {
        PidConfig {
            kp,
            ki,
            kd,
            integral_init: 0.0,
            integral_max: None,
            d_delay: 1,
            delta_p_ema_alpha: 0.0,
            delta_d_ema_alpha: 0.0,
            penalty_max: None,
        }
    }

    #[test]
    fn test_first_update_has_no_derivative() {
        // kd only: the first call must not see a derivative kick
        let mut pid = PidLagrangian::new(10.0, &plain(0.0, 0.0, 1.0)).unwrap();
        assert_eq!(pid.update(50.0).unwrap(), 0.0);
        // second call sees 60 - 50
        assert_eq!(pid.update(60.0).unwrap(), 10.0);
    }

    #[test]
    fn test_plain_pid_formula() {
        let mut pid = PidLagrangian::new(10.0, &plain(0.5, 0.1, 0.2)).unwrap();
        // error 2, integral 2, derivative 0
        let p1 = pid.update(12.0).unwrap();
        assert!((p1 - (0.5 * 2.0 + 0.1 * 2.0)).abs() < 1e-12);
        // error 5, integral 7, derivative 3
        let p2 = pid.update(15.0).unwrap();
        assert!((p2 - (0.5 * 5.0 + 0.1 * 7.0 + 0.2 * 3.0)).abs() < 1e-12);
        assert_eq!(pid.last_error(), Some(5.0));
    }

    #[test]
    fn test_negative_output_clamped() {
        let mut pid = PidLagrangian::new(10.0, &plain(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(pid.update(0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_integral_anti_windup() {
        let config = PidConfig {
            integral_max: Some(3.0),
            ..plain(0.0, 1.0, 0.0)
        };
        let mut pid = PidLagrangian::new(0.0, &config).unwrap();
        for _ in 0..10 {
            pid.update(2.0).unwrap();
        }
        assert_eq!(pid.integral_error(), 3.0);
        assert_eq!(pid.current_penalty(), 3.0);

        // integral never goes below zero
        for _ in 0..10 {
            pid.update(-5.0).unwrap();
        }
        assert_eq!(pid.integral_error(), 0.0);
    }

    #[test]
    fn test_penalty_max() {
        let config = PidConfig {
            penalty_max: Some(1.5),
            ..plain(10.0, 0.0, 0.0)
        };
        let mut pid = PidLagrangian::new(0.0, &config).unwrap();
        assert_eq!(pid.update(100.0).unwrap(), 1.5);
    }

    #[test]
    fn test_derivative_delay() {
        let config = PidConfig {
            d_delay: 2,
            ..plain(0.0, 0.0, 1.0)
        };
        let mut pid = PidLagrangian::new(0.0, &config).unwrap();
        assert_eq!(pid.update(1.0).unwrap(), 0.0);
        // history [1]: 3 - 1
        assert_eq!(pid.update(3.0).unwrap(), 2.0);
        // history [1, 3]: 6 - 1
        assert_eq!(pid.update(6.0).unwrap(), 5.0);
        // history [3, 6]: 10 - 3
        assert_eq!(pid.update(10.0).unwrap(), 7.0);
    }

    #[test]
    fn test_ema_smoothing_of_proportional_term() {
        let config = PidConfig {
            delta_p_ema_alpha: 0.5,
            ..plain(1.0, 0.0, 0.0)
        };
        let mut pid = PidLagrangian::new(0.0, &config).unwrap();
        assert_eq!(pid.update(4.0).unwrap(), 2.0);
        assert_eq!(pid.update(4.0).unwrap(), 3.0);
    }

    #[test]
    fn test_nan_cost_keeps_integral_usable() {
        let config = PidConfig {
            kd: 0.0,
            ..PidConfig::default()
        };
        let mut pid = PidLagrangian::new(25.0, &config).unwrap();
        pid.update(30.0).unwrap();
        let integral = pid.integral_error();
        let penalty = pid.current_penalty();

        assert!(pid.update(f64::NAN).is_err());
        assert_eq!(pid.integral_error(), integral);
        assert_eq!(pid.current_penalty(), penalty);

        let mut previous = penalty;
        for _ in 0..50 {
            let p = pid.update(40.0).unwrap();
            assert!(p >= previous);
            previous = p;
        }
        assert!(pid.integral_error().is_finite());
        assert!(previous > penalty);
    }

    #[test]
    fn test_initial_integral_sets_penalty() {
        let config = PidConfig {
            integral_init: 2.0,
            ..plain(0.0, 0.5, 0.0)
        };
        let pid = PidLagrangian::new(0.0, &config).unwrap();
        assert_eq!(pid.current_penalty(), 1.0);
    }

    #[test]
    fn test_negative_gain_is_config_error() {
        let err = PidLagrangian::new(1.0, &plain(-1.0, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, SafeRlError::Config(_)));
    }
}
