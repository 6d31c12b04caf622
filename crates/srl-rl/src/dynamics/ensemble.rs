//! Ensemble of probabilistic one-step transition models

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;

use srl_core::{EnvType, Result, SafeRlError};

/// Trained ensemble queried by the virtual environment.
///
/// `predict` returns per-member means and variances shaped
/// `[members, batch, outputs]`. State outputs are deltas relative to the
/// input observation.
pub trait EnsembleModel {
    fn predict(&self, inputs: ArrayView2<'_, f64>) -> Result<(Array3<f64>, Array3<f64>)>;

    /// Members selected by validation performance
    fn elite_model_idxes(&self) -> &[usize];

    fn num_members(&self) -> usize;

    fn env_type(&self) -> EnvType;
}

/// One affine Gaussian member: `mean = x W + b`, fixed variance per output
#[derive(Debug, Clone)]
pub struct LinearMember {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
    pub variance: Array1<f64>,
}

/// Ensemble of affine Gaussian members.
///
/// Stands in for a trained network ensemble in rollouts, benches and tests.
#[derive(Debug, Clone)]
pub struct LinearGaussianEnsemble {
    members: Vec<LinearMember>,
    elites: Vec<usize>,
    env_type: EnvType,
    input_dim: usize,
    output_dim: usize,
}

impl LinearGaussianEnsemble {
    pub fn new(members: Vec<LinearMember>, elites: Vec<usize>, env_type: EnvType) -> Result<Self> {
        let first = members
            .first()
            .ok_or_else(|| SafeRlError::config("ensemble needs at least one member"))?;
        let (input_dim, output_dim) = first.weights.dim();

        for (i, member) in members.iter().enumerate() {
            if member.weights.dim() != (input_dim, output_dim)
                || member.bias.len() != output_dim
                || member.variance.len() != output_dim
            {
                return Err(SafeRlError::shape(format!(
                    "member {i} does not match {input_dim}x{output_dim} layout"
                )));
            }
            if member.variance.iter().any(|v| !(*v > 0.0)) {
                return Err(SafeRlError::config(format!(
                    "member {i} has a non-positive variance"
                )));
            }
        }
        if elites.is_empty() {
            return Err(SafeRlError::config("elite set must not be empty"));
        }
        if let Some(bad) = elites.iter().find(|&&e| e >= members.len()) {
            return Err(SafeRlError::config(format!(
                "elite index {bad} out of range for {} members",
                members.len()
            )));
        }

        Ok(Self {
            members,
            elites,
            env_type,
            input_dim,
            output_dim,
        })
    }

    /// Random members around the identity-delta model (zero mean deltas)
    pub fn random<R: Rng + ?Sized>(
        num_members: usize,
        num_elites: usize,
        input_dim: usize,
        output_dim: usize,
        noise_std: f64,
        env_type: EnvType,
        rng: &mut R,
    ) -> Result<Self> {
        if num_elites == 0 || num_elites > num_members {
            return Err(SafeRlError::config(format!(
                "num_elites must lie in 1..={num_members}, got {num_elites}"
            )));
        }
        let members = (0..num_members)
            .map(|_| {
                let weights = Array2::from_shape_fn((input_dim, output_dim), |_| {
                    noise_std * rng.sample::<f64, _>(StandardNormal)
                });
                let bias = Array1::from_shape_fn(output_dim, |_| {
                    noise_std * rng.sample::<f64, _>(StandardNormal)
                });
                let variance = Array1::from_elem(output_dim, noise_std * noise_std);
                LinearMember {
                    weights,
                    bias,
                    variance,
                }
            })
            .collect();

        let mut order: Vec<usize> = (0..num_members).collect();
        order.shuffle(rng);
        order.truncate(num_elites);
        order.sort_unstable();

        Self::new(members, order, env_type)
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }
}

impl EnsembleModel for LinearGaussianEnsemble {
    fn predict(&self, inputs: ArrayView2<'_, f64>) -> Result<(Array3<f64>, Array3<f64>)> {
        let (batch, input_dim) = inputs.dim();
        if input_dim != self.input_dim {
            return Err(SafeRlError::shape(format!(
                "ensemble expects {} input columns, got {input_dim}",
                self.input_dim
            )));
        }

        let shape = (self.members.len(), batch, self.output_dim);
        let mut means = Array3::zeros(shape);
        let mut variances = Array3::zeros(shape);

        for (i, member) in self.members.iter().enumerate() {
            let mean = inputs.dot(&member.weights) + &member.bias;
            let variance = member
                .variance
                .broadcast((batch, self.output_dim))
                .ok_or_else(|| SafeRlError::shape("variance does not broadcast over batch"))?;
            means.index_axis_mut(Axis(0), i).assign(&mean);
            variances.index_axis_mut(Axis(0), i).assign(&variance);
        }

        Ok((means, variances))
    }

    fn elite_model_idxes(&self) -> &[usize] {
        &self.elites
    }

    fn num_members(&self) -> usize {
        self.members.len()
    }

    fn env_type(&self) -> EnvType {
        self.env_type
    }
}
