use std::fmt;

use thiserror::Error;

use crate::model::{
    ActivityId, CompetencyId, KnowledgeId, ProcessType, Role, SubprocessId, UnitId,
};
use crate::permission::Action;
use crate::remote::RemoteError;

/// Errors raised by workflow transitions, grouped by [`ErrorKind`].
#[derive(Debug, Error)]
pub enum WorkflowError {
    // Validation: detectable before any request is built.
    #[error("no unit selected")]
    EmptySelection,

    #[error("required field is blank: {field}")]
    BlankField { field: &'static str },

    #[error("process type {0} has no subprocess workflow")]
    UnsupportedProcessType(ProcessType),

    #[error("unit {0} is not part of the hierarchy")]
    UnknownUnit(UnitId),

    #[error("activity {0} not found")]
    UnknownActivity(ActivityId),

    #[error("activity {0} already exists")]
    DuplicateActivity(ActivityId),

    #[error("knowledge {0} not found")]
    UnknownKnowledge(KnowledgeId),

    #[error("competency {0} not found")]
    UnknownCompetency(CompetencyId),

    #[error("competency {0} already exists")]
    DuplicateCompetency(CompetencyId),

    // Permission: the active role lacks the capability.
    #[error("{role} may not {action} while {situation}")]
    Forbidden {
        action: Action,
        role: Role,
        situation: String,
    },

    // Precondition: the role is fine, the state is not.
    #[error("{action} is not possible while {situation}")]
    InvalidSituation { action: Action, situation: String },

    #[error("units not eligible for this process: {}", join_ids(units))]
    IneligibleUnit { units: Vec<UnitId> },

    #[error("subprocesses still pending for units: {}", join_ids(units))]
    PendingSubprocesses { units: Vec<UnitId> },

    #[error("cadastro has no activities")]
    NoActivities,

    #[error("activities without knowledge items: {}", join_ids(activities))]
    IncompleteActivities { activities: Vec<ActivityId> },

    #[error("competencies without activities: {}", join_ids(competencies))]
    EmptyCompetencies { competencies: Vec<CompetencyId> },

    #[error("activities not linked to any competency: {}", join_ids(activities))]
    UnassociatedActivities { activities: Vec<ActivityId> },

    #[error("a transition for subprocess {0} is already in flight")]
    RequestInFlight(SubprocessId),

    // Transport: the remote service did not confirm.
    #[error("remote service failure: {0}")]
    Transport(RemoteError),
}

fn join_ids<T: fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Classifies a workflow failure for the caller's recovery decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Bad input, fixable inline before retrying.
    Validation,
    /// Role lacks the capability; the action must be hidden, not retried.
    Permission,
    /// Invariant not met; fix the offending items and retry.
    Precondition,
    /// Network or server failure; state unchanged, retry is safe.
    Transport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "Validation"),
            ErrorKind::Permission => write!(f, "Permission"),
            ErrorKind::Precondition => write!(f, "Precondition"),
            ErrorKind::Transport => write!(f, "Transport"),
        }
    }
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::EmptySelection
            | WorkflowError::BlankField { .. }
            | WorkflowError::UnsupportedProcessType(_)
            | WorkflowError::UnknownUnit(_)
            | WorkflowError::UnknownActivity(_)
            | WorkflowError::DuplicateActivity(_)
            | WorkflowError::UnknownKnowledge(_)
            | WorkflowError::UnknownCompetency(_)
            | WorkflowError::DuplicateCompetency(_) => ErrorKind::Validation,
            WorkflowError::Forbidden { .. } => ErrorKind::Permission,
            WorkflowError::InvalidSituation { .. }
            | WorkflowError::IneligibleUnit { .. }
            | WorkflowError::PendingSubprocesses { .. }
            | WorkflowError::NoActivities
            | WorkflowError::IncompleteActivities { .. }
            | WorkflowError::EmptyCompetencies { .. }
            | WorkflowError::UnassociatedActivities { .. }
            | WorkflowError::RequestInFlight(_) => ErrorKind::Precondition,
            WorkflowError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Permission failures are final for the session; everything else can be
    /// retried once the user corrects the input or the service recovers.
    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::Permission
    }
}

impl From<RemoteError> for WorkflowError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::PendingSubprocesses { units } => {
                WorkflowError::PendingSubprocesses { units }
            }
            other => WorkflowError::Transport(other),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
