//! CLI command modules

pub mod algorithms;
pub mod config;
pub mod control;
pub mod rollout;
