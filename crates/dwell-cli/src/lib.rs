//! Attention dwell-time tracker CLI library.
//!
//! This crate provides the command-line interface and the stdin/stdout daemon
//! that hosts the tracker.

mod cli;
pub mod commands;
mod config;
pub mod host;
pub mod service;

pub use cli::{Cli, Commands, SettingsAction};
pub use config::Config;
