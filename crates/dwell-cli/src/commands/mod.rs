//! CLI subcommand implementations.

pub mod clear;
pub mod export;
pub mod prune;
pub mod report;
pub mod run;
pub mod settings;
pub mod status;
