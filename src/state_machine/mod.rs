mod impact;
mod process;
mod situation;
mod subprocess;

pub use impact::{ActivityChange, ImpactReport, ImpactedCompetency, diff};
pub use process::{Process, ProcessSituation, ProcessStateMachine};
pub use situation::{CadastroState, MapaState, Situation, Track, Variant};
pub use subprocess::{
    Activity, CadastroEdit, Competency, Knowledge, MapBaseline, MapEdit, Movement, ReviewOutcome,
    ReviewRecord, Subprocess, SubprocessStateMachine, Transition,
};

use tracing::warn;

use crate::error::{WorkflowError, WorkflowResult};
use crate::hierarchy::{UnitHierarchy, UnitPosition};
use crate::model::{Actor, UnitId};
use crate::permission::{Action, CapabilitySet, GuardSituation, capabilities};

/// Everything a transition needs to know about who is acting and where.
///
/// Passed explicitly into every operation; nothing is read from ambient state.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowContext<'a> {
    pub hierarchy: &'a UnitHierarchy,
    pub actor: &'a Actor,
}

impl<'a> WorkflowContext<'a> {
    pub fn new(hierarchy: &'a UnitHierarchy, actor: &'a Actor) -> Self {
        Self { hierarchy, actor }
    }

    /// Position of the actor's unit relative to `unit`. Process-level guards
    /// pass `None` and are evaluated as unrelated.
    pub fn position(&self, unit: Option<UnitId>) -> UnitPosition {
        match unit {
            Some(target) => self.hierarchy.position_of(self.actor.unit(), target),
            None => UnitPosition::Unrelated,
        }
    }

    pub fn capabilities(&self, unit: Option<UnitId>, situation: GuardSituation) -> CapabilitySet {
        capabilities(self.actor.role(), self.position(unit), situation)
    }

    /// Fails with `Forbidden` when the role cannot perform `action` from this
    /// position in any situation, and with `InvalidSituation` when it could
    /// but not in the current one.
    pub fn require(
        &self,
        action: Action,
        unit: Option<UnitId>,
        situation: GuardSituation,
    ) -> WorkflowResult<()> {
        if self.capabilities(unit, situation).allows(action) {
            return Ok(());
        }

        let role = self.actor.role();
        let position = self.position(unit);
        let ever_allowed = guard_situations()
            .any(|s| capabilities(role, position, s).allows(action));

        if ever_allowed {
            Err(WorkflowError::InvalidSituation {
                action,
                situation: situation.to_string(),
            })
        } else {
            warn!(%action, %role, ?position, %situation, "action denied");
            Err(WorkflowError::Forbidden {
                action,
                role,
                situation: situation.to_string(),
            })
        }
    }
}

fn guard_situations() -> impl Iterator<Item = GuardSituation> {
    Situation::ALL
        .into_iter()
        .map(GuardSituation::Subprocess)
        .chain(ProcessSituation::ALL.into_iter().map(GuardSituation::Process))
}
