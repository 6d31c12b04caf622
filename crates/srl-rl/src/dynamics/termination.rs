//! Environment-specific termination heuristics for synthetic rollouts

use ndarray::{Array1, ArrayView2, Axis};

use srl_core::{Result, SafeRlError};

/// Termination rule resolved from an environment name
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerminationRule {
    Hopper,
    Walker2d,
    /// `walker_*` variants: torso height and angle are the last two columns
    WalkerVariant { height_offset: f64 },
    /// No heuristic known for this environment; rollouts never terminate
    Never,
}

impl TerminationRule {
    pub fn for_env(env_name: &str) -> Self {
        if env_name == "Hopper-v2" {
            TerminationRule::Hopper
        } else if env_name == "Walker2d-v2" {
            TerminationRule::Walker2d
        } else if env_name.contains("walker_") {
            let height_offset = if env_name.contains("walker_7") || env_name.contains("walker_5")
            {
                0.0
            } else {
                0.26
            };
            TerminationRule::WalkerVariant { height_offset }
        } else {
            TerminationRule::Never
        }
    }

    /// Minimum number of state columns the rule reads
    fn required_columns(self) -> usize {
        match self {
            TerminationRule::Hopper
            | TerminationRule::Walker2d
            | TerminationRule::WalkerVariant { .. } => 2,
            TerminationRule::Never => 0,
        }
    }

    fn row_done(self, row: ndarray::ArrayView1<'_, f64>) -> bool {
        match self {
            TerminationRule::Hopper => {
                let height = row[0];
                let angle = row[1];
                // one-sided bound on every component after height
                let alive = row.iter().all(|v| v.is_finite())
                    && row.iter().skip(1).all(|&v| v < 100.0)
                    && height > 0.7
                    && angle.abs() < 0.2;
                !alive
            }
            TerminationRule::Walker2d => {
                let height = row[0];
                let angle = row[1];
                let alive = height > 0.8 && height < 2.0 && angle > -1.0 && angle < 1.0;
                !alive
            }
            TerminationRule::WalkerVariant { height_offset } => {
                let n = row.len();
                let torso_height = row[n - 2];
                let torso_angle = row[n - 1];
                let alive = torso_height > 0.8 - height_offset
                    && torso_height < 2.0 - height_offset
                    && torso_angle > -1.0
                    && torso_angle < 1.0;
                !alive
            }
            TerminationRule::Never => false,
        }
    }
}

/// Per-row termination flags for a batch of predicted transitions.
///
/// Unknown environment names never terminate.
pub fn termination_fn(
    env_name: &str,
    obs: ArrayView2<'_, f64>,
    act: ArrayView2<'_, f64>,
    next_obs: ArrayView2<'_, f64>,
) -> Result<Array1<bool>> {
    let batch = next_obs.nrows();
    if obs.nrows() != batch || act.nrows() != batch {
        return Err(SafeRlError::shape(format!(
            "batch sizes differ: obs {}, act {}, next_obs {batch}",
            obs.nrows(),
            act.nrows()
        )));
    }

    let rule = TerminationRule::for_env(env_name);
    if next_obs.ncols() < rule.required_columns() {
        return Err(SafeRlError::shape(format!(
            "{env_name} termination needs {} state columns, got {}",
            rule.required_columns(),
            next_obs.ncols()
        )));
    }

    Ok(next_obs
        .axis_iter(Axis(0))
        .map(|row| rule.row_done(row))
        .collect())
}
