//! List registered algorithms

use anyhow::Result;

use srl_rl::AlgorithmRegistry;

pub fn run() -> Result<()> {
    let registry = AlgorithmRegistry::with_defaults();

    println!("Registered Algorithms");
    println!("=====================\n");
    println!("{:<20} {:<12} {:<14} {}", "name", "base", "controller", "policy");
    for kind in registry.list() {
        let policy = if kind.is_off_policy() { "off" } else { "on" };
        println!(
            "{:<20} {:<12} {:<14} {}",
            kind.name(),
            format!("{:?}", kind.base()),
            format!("{:?}", kind.controller()),
            policy
        );
    }
    Ok(())
}
