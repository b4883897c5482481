use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::WorkflowContext;
use super::situation::Variant;
use super::subprocess::Subprocess;
use crate::error::{WorkflowError, WorkflowResult};
use crate::hierarchy::UnitSnapshot;
use crate::model::{ProcessId, ProcessType, SubprocessId, UnitId};
use crate::permission::{Action, GuardSituation};

/// CREATED → IN_PROGRESS → FINISHED, no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessSituation {
    Created,
    InProgress,
    Finished,
}

impl ProcessSituation {
    pub const ALL: [ProcessSituation; 3] = [
        ProcessSituation::Created,
        ProcessSituation::InProgress,
        ProcessSituation::Finished,
    ];
}

impl fmt::Display for ProcessSituation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessSituation::Created => write!(f, "CREATED"),
            ProcessSituation::InProgress => write!(f, "IN_PROGRESS"),
            ProcessSituation::Finished => write!(f, "FINISHED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: ProcessId,
    pub description: String,
    pub process_type: ProcessType,
    pub deadline: NaiveDate,
    pub situation: ProcessSituation,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Units participating in the process, frozen at start.
    pub units: Vec<UnitSnapshot>,
}

impl Process {
    pub fn participants(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units.iter().map(|u| u.id)
    }
}

/// Drives a [`Process`] through its lifecycle.
pub struct ProcessStateMachine;

impl ProcessStateMachine {
    pub fn create(
        id: ProcessId,
        description: &str,
        process_type: ProcessType,
        deadline: NaiveDate,
        ctx: &WorkflowContext<'_>,
    ) -> WorkflowResult<Process> {
        ctx.require(
            Action::Start,
            None,
            GuardSituation::Process(ProcessSituation::Created),
        )?;
        let description = description.trim();
        if description.is_empty() {
            return Err(WorkflowError::BlankField {
                field: "description",
            });
        }

        info!(process = %id, %process_type, "process created");
        Ok(Process {
            id,
            description: description.to_string(),
            process_type,
            deadline,
            situation: ProcessSituation::Created,
            created_at: Utc::now(),
            finished_at: None,
            units: Vec::new(),
        })
    }

    /// Starts the process for `selected` units.
    ///
    /// Every check runs before anything changes: on error the process is
    /// untouched and no subprocess exists. `assign` hands out the id of each
    /// new subprocess.
    pub fn start(
        process: &mut Process,
        ctx: &WorkflowContext<'_>,
        selected: &[UnitId],
        mut assign: impl FnMut(UnitId) -> SubprocessId,
    ) -> WorkflowResult<Vec<Subprocess>> {
        ctx.require(Action::Start, None, GuardSituation::Process(process.situation))?;

        if selected.is_empty() {
            return Err(WorkflowError::EmptySelection);
        }
        let variant = Variant::try_from(process.process_type)?;

        let mut seen = HashSet::new();
        let units: Vec<UnitId> = selected
            .iter()
            .copied()
            .filter(|u| seen.insert(*u))
            .collect();

        if let Some(unknown) = units.iter().find(|u| !ctx.hierarchy.contains(**u)) {
            return Err(WorkflowError::UnknownUnit(*unknown));
        }
        let ineligible: Vec<UnitId> = units
            .iter()
            .copied()
            .filter(|u| !ctx.hierarchy.is_eligible(*u, process.process_type))
            .collect();
        if !ineligible.is_empty() {
            return Err(WorkflowError::IneligibleUnit { units: ineligible });
        }

        let snapshot = ctx
            .hierarchy
            .snapshot(&units)
            .map_err(WorkflowError::UnknownUnit)?;

        let subprocesses: Vec<Subprocess> = snapshot
            .iter()
            .map(|u| Subprocess::new(assign(u.id), process.id, u.id, variant, process.deadline))
            .collect();

        process.units = snapshot;
        process.situation = ProcessSituation::InProgress;
        info!(process = %process.id, units = subprocesses.len(), "process started");
        Ok(subprocesses)
    }

    /// Finishes the process once every one of its subprocesses has a
    /// homologated map. Irreversible.
    pub fn finish(
        process: &mut Process,
        ctx: &WorkflowContext<'_>,
        subprocesses: &[Subprocess],
    ) -> WorkflowResult<()> {
        ctx.require(Action::Finish, None, GuardSituation::Process(process.situation))?;

        let mut pending: Vec<UnitId> = subprocesses
            .iter()
            .filter(|s| s.process == process.id && !s.situation.is_terminal())
            .map(|s| s.unit)
            .collect();
        // Participants with no subprocess at hand count as pending too.
        pending.extend(
            process
                .participants()
                .filter(|u| !subprocesses.iter().any(|s| s.process == process.id && s.unit == *u)),
        );
        if !pending.is_empty() {
            pending.sort();
            pending.dedup();
            return Err(WorkflowError::PendingSubprocesses { units: pending });
        }

        process.situation = ProcessSituation::Finished;
        process.finished_at = Some(Utc::now());
        info!(process = %process.id, "process finished");
        Ok(())
    }
}
