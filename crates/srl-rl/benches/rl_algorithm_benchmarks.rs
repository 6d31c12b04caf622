//! Safe-RL Benchmarks
//!
//! Benchmarks for the per-update and per-rollout hot paths:
//! - Controller updates (Lagrange SGD/Adam, PID-Lagrangian)
//! - Surrogate advantage computation
//! - Virtual environment steps (elite sampling, all-member batches)
//! - Ensemble log-likelihood
//!
//! ## Hot Paths Identified
//! 1. VirtualEnv::predict_step() - Called once per synthetic rollout step
//! 2. log_likelihood() - Called when scoring planner candidates
//! 3. ConstrainedAlgorithm::compute_surrogate() - Called per policy minibatch
//!
//! ## Performance Targets
//! - Controller update: < 100ns
//! - predict_step: < 1ms for a batch of 256 on a 7-member ensemble

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{Array1, Array2, Array3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use srl_core::{
    AlgorithmConfig, AlgorithmKind, EnvType, LagrangeConfig, LambdaOptimizerKind, PidConfig,
    PlanningAlgo,
};
use srl_rl::{
    log_likelihood, AlgorithmRegistry, LagrangeController, LinearGaussianEnsemble,
    PenaltyController, PidLagrangian, VirtualEnv,
};

const OBS_DIM: usize = 11;
const ACT_DIM: usize = 3;

fn create_virtual_env(seed: u64) -> VirtualEnv<LinearGaussianEnsemble> {
    let mut rng = StdRng::seed_from_u64(seed);
    let model = LinearGaussianEnsemble::random(
        7,
        5,
        OBS_DIM + ACT_DIM,
        OBS_DIM + 2,
        0.05,
        EnvType::MujocoVelocity,
        &mut rng,
    )
    .unwrap();
    VirtualEnv::new(PlanningAlgo::MbPpoLag, model, "Hopper-v2", seed).unwrap()
}

fn create_batch(batch: usize) -> (Array2<f64>, Array2<f64>) {
    let mut obs = Array2::from_elem((batch, OBS_DIM), 0.01);
    obs.column_mut(0).fill(1.25);
    let act = Array2::from_elem((batch, ACT_DIM), 0.1);
    (obs, act)
}

// ============================================================================
// Controller Benchmarks
// ============================================================================

fn bench_lagrange_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("controller/lagrange_update");
    for optimizer in [LambdaOptimizerKind::Sgd, LambdaOptimizerKind::Adam] {
        let config = LagrangeConfig {
            lambda_optimizer: optimizer,
            ..LagrangeConfig::default()
        };
        let mut ctrl = LagrangeController::new(25.0, &config).unwrap();

        group.bench_function(format!("{optimizer:?}"), |b| {
            b.iter(|| ctrl.update(black_box(27.5)))
        });
    }
    group.finish();
}

fn bench_pid_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("controller/pid_update");
    for d_delay in [1, 10, 100] {
        let config = PidConfig {
            d_delay,
            ..PidConfig::default()
        };
        let mut ctrl = PidLagrangian::new(25.0, &config).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(d_delay), &d_delay, |b, _| {
            b.iter(|| ctrl.update(black_box(27.5)))
        });
    }
    group.finish();
}

// ============================================================================
// Algorithm Benchmarks
// ============================================================================

fn bench_compute_surrogate(c: &mut Criterion) {
    let registry = AlgorithmRegistry::with_defaults();
    let alg = registry
        .build(AlgorithmKind::PpoLag, &AlgorithmConfig::default())
        .unwrap();

    let mut group = c.benchmark_group("algorithm/compute_surrogate");
    for size in [64, 1024, 16384] {
        let adv = Array1::from_elem(size, 0.5);
        let cost_adv = Array1::from_elem(size, 0.1);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| alg.compute_surrogate(adv.view(), cost_adv.view()))
        });
    }
    group.finish();
}

// ============================================================================
// Virtual Environment Benchmarks
// ============================================================================

fn bench_predict_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("virtual_env/predict_step");
    for batch in [1, 32, 256] {
        let mut env = create_virtual_env(0);
        let (obs, act) = create_batch(batch);

        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, _| {
            b.iter(|| env.predict_step(obs.view(), act.view(), None, false))
        });
    }
    group.finish();
}

fn bench_predict_step_batched(c: &mut Criterion) {
    let mut env = create_virtual_env(1);
    let (obs, act) = create_batch(256);

    c.bench_function("virtual_env/predict_step_batched_all_members", |b| {
        b.iter(|| env.predict_step_batched(obs.view(), act.view(), true, false))
    });
}

fn bench_log_likelihood(c: &mut Criterion) {
    let mut group = c.benchmark_group("dynamics/log_likelihood");
    for members in [1, 5, 7] {
        let inputs = Array2::from_elem((256, OBS_DIM), 0.3);
        let means = Array3::from_elem((members, 256, OBS_DIM), 0.25);
        let variances = Array3::from_elem((members, 256, OBS_DIM), 0.5);

        group.bench_with_input(BenchmarkId::from_parameter(members), &members, |b, _| {
            b.iter(|| log_likelihood(inputs.view(), means.view(), variances.view()))
        });
    }
    group.finish();
}

criterion_group!(
    name = controller_benchmarks;
    config = Criterion::default();
    targets =
        bench_lagrange_update,
        bench_pid_update,
);

criterion_group!(
    name = algorithm_benchmarks;
    config = Criterion::default();
    targets =
        bench_compute_surrogate,
);

criterion_group!(
    name = virtual_env_benchmarks;
    config = Criterion::default();
    targets =
        bench_predict_step,
        bench_predict_step_batched,
        bench_log_likelihood,
);

criterion_main!(
    controller_benchmarks,
    algorithm_benchmarks,
    virtual_env_benchmarks
);
