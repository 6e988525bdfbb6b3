//! ---
//! rl_section: "03-plan-execution"
//! rl_subsection: "01-bootstrap"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Plan execution engine exports and shared types."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
//! The RackLab execution engine: loads a test plan, drives a freshly
//! constructed device simulator through it step by step, and collects one
//! outcome record per step into an ordered report.
//!
//! Execution is synchronous and sequential. Callers that want concurrency
//! run independent plans on independent engine invocations; each invocation
//! owns its simulator exclusively.

pub mod executor;
pub mod plan;
pub mod report;

pub use executor::{execute_plan, execute_plan_file, execute_plan_source, ExecutionOptions};
pub use plan::{ActionKind, PlanError, Step, StepParams, TestPlan};
pub use report::{CheckStatus, Report, StepOutcome, StepResult};
