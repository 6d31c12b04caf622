//! Virtual environment - synthetic transitions from a dynamics ensemble

use ndarray::{concatenate, s, Array1, Array2, Array3, ArrayView1, ArrayView2, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{debug, info};

use srl_core::{EnvType, PlanningAlgo, Result, SafeRlError, VirtualEnvConfig};

use super::ensemble::EnsembleModel;
use super::termination::termination_fn;

/// Batch of one-step predictions, one ensemble member per row
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub next_state: Array2<f64>,
    pub reward: Option<Array1<f64>>,
    pub cost: Option<Array1<f64>>,
    pub terminated: Option<Array1<bool>>,
    /// Ensemble member used for each batch row
    pub members: Vec<usize>,
}

/// Single-transition view of a [`StepOutcome`]
#[derive(Debug, Clone)]
pub struct SingleStep {
    pub next_state: Array1<f64>,
    pub reward: Option<f64>,
    pub cost: Option<f64>,
    pub terminated: Option<bool>,
    pub member: usize,
}

/// Samples and predicted variances of one output group, `[members, batch, dims]`
#[derive(Debug, Clone)]
pub struct GaussianSlice {
    pub samples: Array3<f64>,
    pub variances: Array3<f64>,
}

impl GaussianSlice {
    fn columns(samples: &Array3<f64>, variances: &Array3<f64>, from: usize, to: usize) -> Self {
        Self {
            samples: samples.slice(s![.., .., from..to]).to_owned(),
            variances: variances.slice(s![.., .., from..to]).to_owned(),
        }
    }
}

/// Per-member predictions split into labeled groups for planning.
///
/// The leading axis holds every ensemble member when all members were
/// requested, otherwise a single entry with one elite member per row.
#[derive(Debug, Clone)]
pub struct BatchedPrediction {
    pub samples: Array3<f64>,
    pub variances: Array3<f64>,
    pub state: GaussianSlice,
    pub reward: Option<GaussianSlice>,
    pub cost: Option<GaussianSlice>,
    /// Member chosen per row; `None` when all members are returned
    pub members: Option<Vec<usize>>,
}

/// Rollout wrapper around a trained ensemble.
///
/// Each call is a function of its inputs and the environment's RNG; the
/// only state kept between calls is that RNG.
pub struct VirtualEnv<M: EnsembleModel> {
    algo: PlanningAlgo,
    model: M,
    env_name: String,
    state_start_dim: usize,
    rng: StdRng,
}

impl<M: EnsembleModel> VirtualEnv<M> {
    pub fn new(algo: PlanningAlgo, model: M, env_name: impl Into<String>, seed: u64) -> Result<Self> {
        let env_name = env_name.into();
        let members = model.num_members();
        if members == 0 {
            return Err(SafeRlError::config("ensemble has no members"));
        }
        let elites = model.elite_model_idxes();
        if elites.is_empty() {
            return Err(SafeRlError::config("ensemble has an empty elite set"));
        }
        if let Some(bad) = elites.iter().find(|&&e| e >= members) {
            return Err(SafeRlError::config(format!(
                "elite index {bad} out of range for {members} members"
            )));
        }

        let state_start_dim = algo.state_start_dim(model.env_type());
        info!(
            %algo,
            env_type = %model.env_type(),
            env_name = %env_name,
            state_start_dim,
            "virtual environment created"
        );

        Ok(Self {
            algo,
            model,
            env_name,
            state_start_dim,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Build from configuration; the configured env type must match the model
    pub fn from_config(config: &VirtualEnvConfig, model: M, seed: u64) -> Result<Self> {
        if config.env_type != model.env_type() {
            return Err(SafeRlError::config(format!(
                "configured env type {} does not match ensemble env type {}",
                config.env_type,
                model.env_type()
            )));
        }
        Self::new(config.algo, model, config.env_name.clone(), seed)
    }

    pub fn algo(&self) -> PlanningAlgo {
        self.algo
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn env_type(&self) -> EnvType {
        self.model.env_type()
    }

    pub fn state_start_dim(&self) -> usize {
        self.state_start_dim
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Predict one step for a batch, one member per row.
    ///
    /// With `member_index` every row uses that member; otherwise each row
    /// draws a member uniformly from the elite set.
    pub fn predict_step(
        &mut self,
        obs: ArrayView2<'_, f64>,
        act: ArrayView2<'_, f64>,
        member_index: Option<usize>,
        deterministic: bool,
    ) -> Result<StepOutcome> {
        let (samples, _) = self.ensemble_samples(obs, act, deterministic)?;
        let members = self.select_members(obs.nrows(), member_index)?;
        let picked = gather_rows(&samples, &members);

        let start = self.state_start_dim;
        let env_type = self.model.env_type();

        let next_state = picked.slice(s![.., start..]).to_owned();
        let reward = (start >= 1).then(|| picked.column(0).to_owned());
        let cost = env_type.models_cost().then(|| picked.column(1).to_owned());
        let terminated = if env_type.models_cost() {
            Some(termination_fn(&self.env_name, obs, act, next_state.view())?)
        } else {
            None
        };

        Ok(StepOutcome {
            next_state,
            reward,
            cost,
            terminated,
            members,
        })
    }

    /// [`VirtualEnv::predict_step`] for a single observation/action pair
    pub fn predict_single(
        &mut self,
        obs: ArrayView1<'_, f64>,
        act: ArrayView1<'_, f64>,
        member_index: Option<usize>,
        deterministic: bool,
    ) -> Result<SingleStep> {
        let obs = obs.insert_axis(Axis(0));
        let act = act.insert_axis(Axis(0));
        let outcome = self.predict_step(obs, act, member_index, deterministic)?;

        Ok(SingleStep {
            next_state: outcome.next_state.row(0).to_owned(),
            reward: outcome.reward.map(|r| r[0]),
            cost: outcome.cost.map(|c| c[0]),
            terminated: outcome.terminated.map(|t| t[0]),
            member: outcome.members[0],
        })
    }

    /// Predict one step keeping the member axis, for uncertainty-aware planning
    pub fn predict_step_batched(
        &mut self,
        obs: ArrayView2<'_, f64>,
        act: ArrayView2<'_, f64>,
        use_all_members: bool,
        deterministic: bool,
    ) -> Result<BatchedPrediction> {
        let (samples, variances) = self.ensemble_samples(obs, act, deterministic)?;

        let (samples, variances, members) = if use_all_members {
            (samples, variances, None)
        } else {
            let members = self.select_members(obs.nrows(), None)?;
            let picked = gather_rows(&samples, &members).insert_axis(Axis(0));
            let picked_var = gather_rows(&variances, &members).insert_axis(Axis(0));
            (picked, picked_var, Some(members))
        };

        let start = self.state_start_dim;
        let outputs = samples.len_of(Axis(2));
        let state = GaussianSlice::columns(&samples, &variances, start, outputs);
        let reward = (start >= 1).then(|| GaussianSlice::columns(&samples, &variances, 0, 1));
        let cost = self
            .model
            .env_type()
            .models_cost()
            .then(|| GaussianSlice::columns(&samples, &variances, 1, 2));

        Ok(BatchedPrediction {
            samples,
            variances,
            state,
            reward,
            cost,
            members,
        })
    }

    /// Query the ensemble, restore absolute state, and sample (or take the mean)
    fn ensemble_samples(
        &mut self,
        obs: ArrayView2<'_, f64>,
        act: ArrayView2<'_, f64>,
        deterministic: bool,
    ) -> Result<(Array3<f64>, Array3<f64>)> {
        let batch = obs.nrows();
        if act.nrows() != batch {
            return Err(SafeRlError::shape(format!(
                "obs batch {batch} does not match act batch {}",
                act.nrows()
            )));
        }

        let inputs = concatenate(Axis(1), &[obs.view(), act.view()])
            .map_err(|e| SafeRlError::shape(format!("cannot concatenate obs and act: {e}")))?;
        let (mut means, variances) = self.model.predict(inputs.view())?;

        let (members, pred_batch, outputs) = means.dim();
        if variances.dim() != means.dim() {
            return Err(SafeRlError::shape(format!(
                "means {:?} and variances {:?} differ",
                means.dim(),
                variances.dim()
            )));
        }
        if members != self.model.num_members() || pred_batch != batch {
            return Err(SafeRlError::shape(format!(
                "ensemble returned {members}x{pred_batch}, expected {}x{batch}",
                self.model.num_members()
            )));
        }
        if outputs < self.state_start_dim || outputs - self.state_start_dim != obs.ncols() {
            return Err(SafeRlError::shape(format!(
                "ensemble outputs {outputs} columns; state offset {} leaves room for {} obs columns, got {}",
                self.state_start_dim,
                outputs.saturating_sub(self.state_start_dim),
                obs.ncols()
            )));
        }
        if variances.iter().any(|v| !(*v >= 0.0)) {
            return Err(SafeRlError::Model(
                "ensemble predicted a negative or NaN variance".to_string(),
            ));
        }

        // members predict deltas for the state columns
        let mut state = means.slice_mut(s![.., .., self.state_start_dim..]);
        state += &obs;

        if !deterministic {
            let rng = &mut self.rng;
            Zip::from(&mut means).and(&variances).for_each(|m, &v| {
                let noise: f64 = rng.sample(StandardNormal);
                *m += noise * v.sqrt();
            });
        }

        debug!(members, batch, outputs, deterministic, "ensemble step sampled");
        Ok((means, variances))
    }

    fn select_members(&mut self, batch: usize, member_index: Option<usize>) -> Result<Vec<usize>> {
        match member_index {
            Some(idx) if idx >= self.model.num_members() => Err(SafeRlError::Model(format!(
                "member index {idx} out of range for {} members",
                self.model.num_members()
            ))),
            Some(idx) => Ok(vec![idx; batch]),
            None => {
                let elites = self.model.elite_model_idxes();
                (0..batch)
                    .map(|_| {
                        elites
                            .choose(&mut self.rng)
                            .copied()
                            .ok_or_else(|| SafeRlError::Model("empty elite set".to_string()))
                    })
                    .collect()
            }
        }
    }
}

/// Row `b` of the result is `source[members[b], b, ..]`
fn gather_rows(source: &Array3<f64>, members: &[usize]) -> Array2<f64> {
    let (_, batch, outputs) = source.dim();
    let mut picked = Array2::zeros((batch, outputs));
    for (b, (&m, mut row)) in members.iter().zip(picked.rows_mut()).enumerate() {
        row.assign(&source.slice(s![m, b, ..]));
    }
    picked
}
