//! ---
//! rl_section: "01-core-runtime"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Shared primitives and utilities for the harness runtime."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
use chrono::Utc;

/// Wall-clock seconds since the unix epoch. Step and run records stamp
/// completion times at this granularity, so ties between adjacent entries
/// are legal.
pub fn unix_seconds() -> i64 {
    Utc::now().timestamp()
}
