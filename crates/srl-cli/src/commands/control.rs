//! Drive a penalty controller over a recorded cost trace

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use srl_core::{AlgorithmKind, Config, RunId};
use srl_rl::{AlgorithmRegistry, Controller, EpochLogger, MetricsSink, EP_COST_KEY};

#[derive(Args)]
pub struct ControlArgs {
    /// Observed average episodic costs, one per epoch
    #[arg(long, value_delimiter = ',', conflicts_with = "trace")]
    costs: Vec<f64>,

    /// JSON file holding an array of observed costs
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Algorithm to run instead of the configured one (e.g. PPOLag, TRPOPid)
    #[arg(short, long)]
    algorithm: Option<String>,

    /// Override the configured cost limit
    #[arg(long)]
    cost_limit: Option<f64>,

    /// Print a JSON report instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct EpochRow {
    epoch: usize,
    observed_cost: f64,
    penalty: f64,
}

#[derive(Debug, Serialize)]
struct ControlReport {
    run_id: RunId,
    algorithm: AlgorithmKind,
    cost_limit: Option<f64>,
    epochs: Vec<EpochRow>,
    controller: Controller,
}

pub fn run(args: &ControlArgs, config: &Config) -> Result<()> {
    let costs = load_costs(args)?;

    let mut algo_config = config.algorithm.clone();
    if let Some(name) = &args.algorithm {
        algo_config.kind = name.parse()?;
    }
    if let Some(limit) = args.cost_limit {
        algo_config.cost_limit = limit;
    }

    let registry = AlgorithmRegistry::with_defaults();
    let mut algorithm = registry.build_from_config(&algo_config)?;
    let run_id = RunId::new();
    info!(%run_id, algorithm = %algorithm.kind(), epochs = costs.len(), "control run started");

    let mut logger = EpochLogger::new();
    algorithm.register_keys(&mut logger);

    let mut epochs = Vec::with_capacity(costs.len());
    for (epoch, &cost) in costs.iter().enumerate() {
        logger.store(EP_COST_KEY, cost);
        // off-policy variants update inside the actor loss, so feed them directly
        let penalty = if algorithm.kind().is_off_policy() {
            algorithm.controller_mut().update(cost)?
        } else {
            algorithm.update_penalty(&logger)?
        };
        algorithm.algorithm_specific_logs(&mut logger);
        logger.dump_epoch(epoch);

        epochs.push(EpochRow {
            epoch,
            observed_cost: cost,
            penalty,
        });
    }

    let report = ControlReport {
        run_id,
        algorithm: algorithm.kind(),
        cost_limit: algorithm.controller().limit(),
        epochs,
        controller: algorithm.controller().clone(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report);
    }
    Ok(())
}

fn load_costs(args: &ControlArgs) -> Result<Vec<f64>> {
    let costs = match &args.trace {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read cost trace {}", path.display()))?;
            serde_json::from_str::<Vec<f64>>(&content)
                .with_context(|| format!("Cost trace {} is not a JSON array", path.display()))?
        }
        None => args.costs.clone(),
    };

    if costs.is_empty() {
        bail!("No costs given; pass --costs or --trace");
    }
    if let Some(bad) = costs.iter().find(|c| !c.is_finite()) {
        bail!("Cost trace contains a non-finite value: {bad}");
    }
    Ok(costs)
}

fn print_table(report: &ControlReport) {
    println!("Algorithm: {}", report.algorithm);
    match report.cost_limit {
        Some(limit) => println!("Cost limit: {limit}"),
        None => println!("Cost limit: none (unconstrained)"),
    }
    println!();
    println!("{:>6}  {:>12}  {:>12}", "epoch", "cost", "penalty");
    for row in &report.epochs {
        println!(
            "{:>6}  {:>12.4}  {:>12.6}",
            row.epoch, row.observed_cost, row.penalty
        );
    }
}
