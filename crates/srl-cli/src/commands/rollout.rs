//! Synthetic rollouts through the virtual environment

use anyhow::{Context, Result};
use clap::Args;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use srl_core::Config;
use srl_rl::{log_likelihood, LinearGaussianEnsemble, StepOutcome, VirtualEnv};

#[derive(Args)]
pub struct RolloutArgs {
    /// Number of model steps
    #[arg(short = 'n', long, default_value_t = 10)]
    steps: usize,

    /// Parallel rollouts per step
    #[arg(short, long, default_value_t = 4)]
    batch: usize,

    /// Use member means instead of sampling
    #[arg(long)]
    deterministic: bool,

    /// Score each step under the full ensemble
    #[arg(long)]
    score: bool,

    /// Override the configured seed
    #[arg(long)]
    seed: Option<u64>,

    /// Print JSON lines instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct StepReport {
    step: usize,
    mean_reward: Option<f64>,
    mean_cost: Option<f64>,
    terminated: Option<usize>,
    log_likelihood: Option<f64>,
    epistemic_std: Option<f64>,
}

pub fn run(args: &RolloutArgs, config: &Config) -> Result<()> {
    let reports = rollout(args, config)?;
    if args.json {
        for report in &reports {
            println!("{}", serde_json::to_string(report)?);
        }
    } else {
        print_table(config, &reports);
    }
    Ok(())
}

fn rollout(args: &RolloutArgs, config: &Config) -> Result<Vec<StepReport>> {
    let seed = args.seed.unwrap_or(config.run.seed);
    let ens = &config.ensemble;
    let venv = &config.virtual_env;
    let start = venv.algo.state_start_dim(venv.env_type);

    let mut rng = StdRng::seed_from_u64(seed);
    let model = LinearGaussianEnsemble::random(
        ens.num_members,
        ens.num_elites,
        ens.obs_dim + ens.act_dim,
        ens.obs_dim + start,
        ens.noise_std,
        venv.env_type,
        &mut rng,
    )
    .context("Failed to build synthetic ensemble")?;
    let mut env = VirtualEnv::from_config(venv, model, seed)?;

    info!(
        steps = args.steps,
        batch = args.batch,
        env_name = %venv.env_name,
        "rollout started"
    );

    // start upright so locomotion heuristics do not fire on step one
    let mut obs = Array2::<f64>::zeros((args.batch, ens.obs_dim));
    if ens.obs_dim > 0 {
        obs.column_mut(0).fill(1.25);
    }

    let mut reports = Vec::with_capacity(args.steps);
    for step in 0..args.steps {
        let act = Array2::from_shape_fn((args.batch, ens.act_dim), |_| rng.gen_range(-1.0..1.0));

        let ensemble_view = if args.score {
            Some(env.predict_step_batched(obs.view(), act.view(), true, true)?)
        } else {
            None
        };
        let outcome = env.predict_step(obs.view(), act.view(), None, args.deterministic)?;

        let (mean_log_prob, epistemic_std) = match &ensemble_view {
            Some(batched) => {
                let (lp, std) = log_likelihood(
                    outcome.next_state.view(),
                    batched.state.samples.view(),
                    batched.state.variances.view(),
                )?;
                (lp.mean(), std.mean())
            }
            None => (None, None),
        };

        debug!(step, members = ?outcome.members, "rollout step");
        reports.push(StepReport {
            step,
            mean_reward: outcome.reward.as_ref().and_then(|r| r.mean()),
            mean_cost: outcome.cost.as_ref().and_then(|c| c.mean()),
            terminated: outcome
                .terminated
                .as_ref()
                .map(|t| t.iter().filter(|&&done| done).count()),
            log_likelihood: mean_log_prob,
            epistemic_std,
        });

        obs = restart_terminated(outcome);
    }

    Ok(reports)
}

/// Terminated rows restart from the upright state
fn restart_terminated(outcome: StepOutcome) -> Array2<f64> {
    let mut next = outcome.next_state;
    if let Some(done) = outcome.terminated {
        for (mut row, &d) in next.axis_iter_mut(Axis(0)).zip(done.iter()) {
            if d {
                row.fill(0.0);
                if let Some(first) = row.first_mut() {
                    *first = 1.25;
                }
            }
        }
    }
    next
}

fn print_table(config: &Config, reports: &[StepReport]) {
    println!(
        "Virtual env: {} ({}, {})",
        config.virtual_env.env_name, config.virtual_env.algo, config.virtual_env.env_type
    );
    println!();
    println!(
        "{:>5}  {:>10}  {:>10}  {:>6}  {:>12}  {:>10}",
        "step", "reward", "cost", "done", "loglik", "std"
    );
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
    for r in reports {
        println!(
            "{:>5}  {:>10}  {:>10}  {:>6}  {:>12}  {:>10}",
            r.step,
            fmt(r.mean_reward),
            fmt(r.mean_cost),
            r.terminated.map_or_else(|| "-".to_string(), |t| t.to_string()),
            fmt(r.log_likelihood),
            fmt(r.epistemic_std),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srl_core::{EnvType, PlanningAlgo};

    fn args() -> RolloutArgs {
        RolloutArgs {
            steps: 3,
            batch: 2,
            deterministic: false,
            score: true,
            seed: Some(4),
            json: true,
        }
    }

    #[test]
    fn test_rollout_default_config() {
        let reports = rollout(&args(), &Config::default()).unwrap();
        assert_eq!(reports.len(), 3);
        for r in &reports {
            assert!(r.mean_reward.is_some());
            assert!(r.mean_cost.is_some());
            assert!(r.terminated.is_some());
            assert!(r.epistemic_std.unwrap() >= 0.0);
        }
    }

    #[test]
    fn test_rollout_gym_state_only() {
        let mut config = Config::default();
        config.virtual_env.env_type = EnvType::Gym;
        config.virtual_env.algo = PlanningAlgo::MbPpoLag;
        config.virtual_env.env_name = "Ant".to_string();

        let mut a = args();
        a.score = false;
        let reports = rollout(&a, &config).unwrap();
        assert!(reports.iter().all(|r| r.mean_reward.is_none()));
        assert!(reports.iter().all(|r| r.log_likelihood.is_none()));
    }

    #[test]
    fn test_rollout_is_reproducible() {
        let config = Config::default();
        let a = rollout(&args(), &config).unwrap();
        let b = rollout(&args(), &config).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.mean_reward, y.mean_reward);
            assert_eq!(x.mean_cost, y.mean_cost);
        }
    }
}
