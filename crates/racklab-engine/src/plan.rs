//! ---
//! rl_section: "03-plan-execution"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Test plan model and YAML loader."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("malformed plan: {reason}")]
    Malformed { reason: String },
    #[error("unable to read plan file: {0}")]
    Io(#[from] std::io::Error),
}

fn malformed(reason: impl Into<String>) -> PlanError {
    PlanError::Malformed {
        reason: reason.into(),
    }
}

/// Action requested by a plan step.
///
/// Closed variant set so the dispatcher matches exhaustively; names outside
/// the known set parse into [`ActionKind::Unrecognized`] rather than being
/// rejected, since unknown actions are a recorded per-step outcome, not a
/// load failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    SetFanSpeed,
    ApplyLoad,
    ReadTemperature,
    Unrecognized(String),
}

impl ActionKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "set_fan_speed" => Self::SetFanSpeed,
            "apply_load" => Self::ApplyLoad,
            "read_temperature" => Self::ReadTemperature,
            other => Self::Unrecognized(other.to_owned()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::SetFanSpeed => "set_fan_speed",
            Self::ApplyLoad => "apply_load",
            Self::ReadTemperature => "read_temperature",
            Self::Unrecognized(name) => name,
        }
    }
}

/// Action-specific parameters. All optional at load time: a missing
/// parameter is a dispatch-time failure, not a load-time one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StepParams {
    pub value: Option<i64>,
    pub watts: Option<i64>,
    pub duration_sec: Option<i64>,
    pub expect_max_c: Option<f64>,
}

/// One plan step: an action plus its parameters, executed in plan order.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub id: String,
    pub action: ActionKind,
    pub params: StepParams,
}

impl Step {
    fn from_value(index: usize, value: &Value) -> Result<Self> {
        if !value.is_mapping() {
            return Err(malformed(format!("step {} is not a mapping", index + 1)));
        }

        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(format!("step {} is missing a string `id`", index + 1)))?
            .to_owned();
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(format!("step `{id}` is missing a string `action`")))?;

        // Only the fields needed to dispatch are pulled out here; anything
        // absent or mistyped stays `None` and surfaces at dispatch time.
        let params = StepParams {
            value: value.get("value").and_then(Value::as_i64),
            watts: value.get("watts").and_then(Value::as_i64),
            duration_sec: value.get("duration_sec").and_then(Value::as_i64),
            expect_max_c: value.get("expect_max_c").and_then(Value::as_f64),
        };

        Ok(Self {
            id,
            action: ActionKind::parse(action),
            params,
        })
    }
}

/// Ordered sequence of steps describing one hardware stress test.
///
/// Owned by a single execution and discarded afterwards. Step ids are not
/// required to be unique; duplicates pass through to the report verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct TestPlan {
    steps: Vec<Step>,
}

impl TestPlan {
    /// Parse a YAML plan document.
    pub fn from_source(source: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(source)
            .map_err(|err| malformed(format!("invalid document: {err}")))?;
        let steps_value = document
            .get("steps")
            .ok_or_else(|| malformed("missing `steps` collection"))?;
        let entries = steps_value
            .as_sequence()
            .ok_or_else(|| malformed("`steps` must be a sequence"))?;

        let mut steps = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            steps.push(Step::from_value(index, entry)?);
        }
        Ok(Self { steps })
    }

    /// Read a plan document from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_source(&contents)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SMOKE_PLAN: &str = r#"
steps:
  - id: fan-high
    action: set_fan_speed
    value: 80
  - id: soak
    action: apply_load
    watts: 300
    duration_sec: 5
  - id: verify
    action: read_temperature
    expect_max_c: 60.5
"#;

    #[test]
    fn parses_a_well_formed_plan() {
        let plan = TestPlan::from_source(SMOKE_PLAN).unwrap();
        assert_eq!(plan.len(), 3);

        let steps = plan.steps();
        assert_eq!(steps[0].id, "fan-high");
        assert_eq!(steps[0].action, ActionKind::SetFanSpeed);
        assert_eq!(steps[0].params.value, Some(80));

        assert_eq!(steps[1].action, ActionKind::ApplyLoad);
        assert_eq!(steps[1].params.watts, Some(300));
        assert_eq!(steps[1].params.duration_sec, Some(5));

        assert_eq!(steps[2].action, ActionKind::ReadTemperature);
        assert_eq!(steps[2].params.expect_max_c, Some(60.5));
    }

    #[test]
    fn integer_limits_parse_as_floats() {
        let plan = TestPlan::from_source(
            "steps:\n  - id: t\n    action: read_temperature\n    expect_max_c: 1000\n",
        )
        .unwrap();
        assert_eq!(plan.steps()[0].params.expect_max_c, Some(1000.0));
    }

    #[test]
    fn unknown_actions_parse_as_unrecognized() {
        let plan =
            TestPlan::from_source("steps:\n  - id: odd\n    action: warp_drive\n").unwrap();
        assert_eq!(
            plan.steps()[0].action,
            ActionKind::Unrecognized("warp_drive".into())
        );
        assert_eq!(plan.steps()[0].action.name(), "warp_drive");
    }

    #[test]
    fn duplicate_ids_are_preserved() {
        let plan = TestPlan::from_source(
            "steps:\n  - id: twin\n    action: set_fan_speed\n    value: 1\n  - id: twin\n    action: set_fan_speed\n    value: 2\n",
        )
        .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps()[0].id, plan.steps()[1].id);
    }

    #[test]
    fn missing_steps_collection_is_malformed() {
        let err = TestPlan::from_source("name: no steps here\n").unwrap_err();
        assert!(matches!(err, PlanError::Malformed { .. }));
        assert!(err.to_string().contains("steps"));
    }

    #[test]
    fn non_sequence_steps_is_malformed() {
        let err = TestPlan::from_source("steps: not-a-list\n").unwrap_err();
        assert!(matches!(err, PlanError::Malformed { .. }));
    }

    #[test]
    fn step_without_id_is_malformed() {
        let err = TestPlan::from_source("steps:\n  - action: set_fan_speed\n").unwrap_err();
        assert!(err.to_string().contains("`id`"));
    }

    #[test]
    fn step_without_action_is_malformed() {
        let err = TestPlan::from_source("steps:\n  - id: anon\n    value: 3\n").unwrap_err();
        assert!(err.to_string().contains("`action`"));
    }

    #[test]
    fn missing_parameters_load_fine() {
        // schema validation stops at id/action; absent parameters are a
        // dispatch-time concern
        let plan =
            TestPlan::from_source("steps:\n  - id: bare\n    action: apply_load\n").unwrap();
        assert_eq!(plan.steps()[0].params, StepParams::default());
    }

    #[test]
    fn loads_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SMOKE_PLAN.as_bytes()).unwrap();
        file.flush().unwrap();
        let plan = TestPlan::from_path(file.path()).unwrap();
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn missing_file_reports_io_error() {
        let err = TestPlan::from_path(Path::new("plans/never-written.yaml")).unwrap_err();
        assert!(matches!(err, PlanError::Io(_)));
    }
}
