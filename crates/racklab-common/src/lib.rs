//! ---
//! rl_section: "01-core-runtime"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Shared primitives and utilities for the harness runtime."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
//! Core shared primitives for the RackLab workspace.
//! This crate exposes configuration loading, logging bootstrap, and
//! wall-clock helpers consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{ApiConfig, AppConfig, LoggingConfig, MetricsConfig, SimulationConfig};
pub use logging::{init_tracing, LogFormat};
pub use time::unix_seconds;
