//! ---
//! rl_section: "04-run-tracking"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "In-memory run records and their lifecycle."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
use indexmap::IndexMap;
use parking_lot::RwLock;
use racklab_common::time::unix_seconds;
use racklab_engine::Report;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a run: queued on creation, running while a plan executes,
/// then passed or failed. No paused or cancelled states; once started a
/// plan runs to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Passed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

/// One tracked run: exactly one plan execution and its resulting report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub name: String,
    pub notes: String,
    pub status: RunStatus,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Report>,
}

/// Aggregate counters over the store, served by the JSON metrics summary.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunCounts {
    pub total: usize,
    pub queued: usize,
    pub running: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Why a run could not move into the running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginError {
    NotFound,
    AlreadyRunning,
}

/// In-memory run bookkeeping. Insertion order is preserved so listings read
/// oldest-first. Executions themselves never touch the store lock; it only
/// guards the bookkeeping around them.
#[derive(Debug, Default)]
pub struct RunStore {
    runs: RwLock<IndexMap<Uuid, RunRecord>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        name: String,
        notes: String,
        idempotency_key: Option<String>,
    ) -> RunRecord {
        let record = RunRecord {
            id: Uuid::new_v4(),
            name,
            notes,
            status: RunStatus::Queued,
            created_at: unix_seconds(),
            started_at: None,
            ended_at: None,
            idempotency_key,
            results: None,
        };
        self.runs.write().insert(record.id, record.clone());
        record
    }

    pub fn get(&self, id: Uuid) -> Option<RunRecord> {
        self.runs.read().get(&id).cloned()
    }

    pub fn list(&self) -> Vec<RunRecord> {
        self.runs.read().values().cloned().collect()
    }

    pub fn find_by_idempotency_key(&self, key: &str) -> Option<RunRecord> {
        self.runs
            .read()
            .values()
            .find(|run| run.idempotency_key.as_deref() == Some(key))
            .cloned()
    }

    /// Move a run into `running`. Completed runs may be re-executed (each
    /// execution gets a fresh simulator); a run already mid-execution is
    /// rejected so one record never maps onto two concurrent executions.
    pub fn begin(&self, id: Uuid) -> Result<RunRecord, BeginError> {
        let mut runs = self.runs.write();
        let run = runs.get_mut(&id).ok_or(BeginError::NotFound)?;
        if run.status == RunStatus::Running {
            return Err(BeginError::AlreadyRunning);
        }
        run.status = RunStatus::Running;
        run.started_at = Some(unix_seconds());
        run.ended_at = None;
        run.results = None;
        Ok(run.clone())
    }

    /// Attach the report and final status after an execution finished.
    pub fn complete(&self, id: Uuid, report: Report, status: RunStatus) -> Option<RunRecord> {
        let mut runs = self.runs.write();
        let run = runs.get_mut(&id)?;
        run.status = status;
        run.results = Some(report);
        run.ended_at = Some(unix_seconds());
        Some(run.clone())
    }

    /// Mark a run failed without results, used when the plan never started
    /// executing (structural plan errors).
    pub fn abandon(&self, id: Uuid) -> Option<RunRecord> {
        let mut runs = self.runs.write();
        let run = runs.get_mut(&id)?;
        run.status = RunStatus::Failed;
        run.results = None;
        run.ended_at = Some(unix_seconds());
        Some(run.clone())
    }

    pub fn counts(&self) -> RunCounts {
        let runs = self.runs.read();
        let mut counts = RunCounts {
            total: runs.len(),
            ..RunCounts::default()
        };
        for run in runs.values() {
            match run.status {
                RunStatus::Queued => counts.queued += 1,
                RunStatus::Running => counts.running += 1,
                RunStatus::Passed => counts.passed += 1,
                RunStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
