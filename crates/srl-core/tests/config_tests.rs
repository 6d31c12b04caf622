//! Configuration loading and validation tests

use std::io::Write;

use srl_core::{AlgorithmKind, Config, EnvType, LambdaOptimizerKind, PlanningAlgo};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_without_file_uses_defaults() {
    let config = Config::load_from(None).unwrap();
    assert_eq!(config.algorithm.kind, AlgorithmKind::PpoLag);
    assert_eq!(config.algorithm.cost_limit, 25.0);
    assert_eq!(config.virtual_env.algo, PlanningAlgo::MbPpoLag);
}

#[test]
fn test_load_partial_file() {
    let file = write_config(
        r#"
        [run]
        seed = 7

        [algorithm]
        kind = "TRPOPid"
        cost_limit = 10.0

        [algorithm.pid]
        kp = 0.5
        ki = 0.05
        kd = 0.0
        d_delay = 1

        [algorithm.lagrange]
        lambda_optimizer = "sgd"

        [virtual_env]
        algo = "CAP"
        env_type = "gym"
        env_name = "Walker2d-v2"
        "#,
    );

    let config = Config::load_from(Some(file.path())).unwrap();
    assert_eq!(config.run.seed, 7);
    assert_eq!(config.run.log_level, "info");
    assert_eq!(config.algorithm.kind, AlgorithmKind::TrpoPid);
    assert_eq!(config.algorithm.cost_limit, 10.0);
    assert_eq!(config.algorithm.pid.kp, 0.5);
    assert_eq!(config.algorithm.pid.d_delay, 1);
    // untouched PID fields keep their defaults
    assert_eq!(config.algorithm.pid.penalty_max, Some(100.0));
    assert_eq!(config.algorithm.lagrange.lambda_optimizer, LambdaOptimizerKind::Sgd);
    assert_eq!(config.virtual_env.algo, PlanningAlgo::Cap);
    assert_eq!(config.virtual_env.env_type, EnvType::Gym);
    assert_eq!(config.virtual_env.env_name, "Walker2d-v2");
}

#[test]
fn test_invalid_gain_fails_at_load() {
    let file = write_config(
        r#"
        [algorithm.pid]
        kp = -1.0
        "#,
    );

    let err = Config::load_from(Some(file.path())).unwrap_err();
    assert!(format!("{err:#}").contains("kp"));
}

#[test]
fn test_unknown_algorithm_fails_at_load() {
    let file = write_config(
        r#"
        [algorithm]
        kind = "DDPGLag"
        "#,
    );

    assert!(Config::load_from(Some(file.path())).is_err());
}

#[test]
fn test_default_config_serializes_to_toml() {
    let rendered = toml::to_string_pretty(&Config::default()).unwrap();
    assert!(rendered.contains("[algorithm.pid]"));
    assert!(rendered.contains("kind = \"PPOLag\""));
}
