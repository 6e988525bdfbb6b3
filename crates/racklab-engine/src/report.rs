//! ---
//! rl_section: "03-plan-execution"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Per-step outcome payloads and the ordered run report."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Verdict of a measurement assertion. Equality with the limit passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
}

/// Action-specific result payload produced by dispatching one step.
///
/// Serialized untagged so each variant keeps the exact wire shape consumers
/// expect: `{fan_speed}`, `{temperature, status}`, `{temperature}`, or
/// `{error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepOutcome {
    FanSpeed {
        fan_speed: i64,
    },
    // measurement must precede the bare temperature variant so untagged
    // deserialization does not drop the status field
    Measurement {
        temperature: f64,
        status: CheckStatus,
    },
    Temperature {
        temperature: f64,
    },
    Error {
        error: String,
    },
}

impl StepOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Whether this outcome counts against the run: either a failed
    /// assertion or a recorded per-step error. How to aggregate is the
    /// caller's policy, not the engine's.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Error { .. }
                | Self::Measurement {
                    status: CheckStatus::Fail,
                    ..
                }
        )
    }
}

/// One report entry: the step's id, its outcome, and wall-clock seconds at
/// the moment the step finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub outcome: StepOutcome,
    pub timestamp: i64,
}

/// Ordered sequence of step results, one per plan step, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Report {
    results: Vec<StepResult>,
}

impl Report {
    pub(crate) fn push(&mut self, result: StepResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter()
    }

    /// True when any entry records an error or a failed assertion.
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|entry| entry.outcome.is_failure())
    }
}
