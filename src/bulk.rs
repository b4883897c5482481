//! Ações em bloco: uma única ação aplicada a várias unidades selecionadas.
//!
//! Cada unidade é avaliada pela mesma guarda da ação unitária e aplicada de
//! forma independente. Uma unidade que falha é registrada como ignorada com o
//! motivo; as demais seguem normalmente.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{WorkflowError, WorkflowResult};
use crate::model::{SubprocessId, UnitId};
use crate::permission::{Action, GuardSituation};
use crate::state_machine::{
    ReviewOutcome, Situation, Subprocess, SubprocessStateMachine, Track, WorkflowContext,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkAction {
    /// Accept whichever track is awaiting review.
    Accept { comment: Option<String> },
    Homologate { comment: Option<String> },
    /// Make the created maps available for validation, with this deadline.
    MakeAvailableMapa(NaiveDate),
    ChangeDeadline(NaiveDate),
}

impl BulkAction {
    /// The single-unit action this bulk action performs on a subprocess in
    /// `situation`.
    pub fn action_for(&self, situation: Situation) -> Action {
        match (self, situation.track()) {
            (BulkAction::Accept { .. }, Track::Cadastro) => Action::AcceptCadastro,
            (BulkAction::Accept { .. }, Track::Mapa) => Action::AcceptMapa,
            (BulkAction::Homologate { .. }, Track::Cadastro) => Action::HomologateCadastro,
            (BulkAction::Homologate { .. }, Track::Mapa) => Action::HomologateMapa,
            (BulkAction::MakeAvailableMapa(_), _) => Action::MakeAvailableMapa,
            (BulkAction::ChangeDeadline(_), _) => Action::ChangeDeadline,
        }
    }
}

#[derive(Debug)]
pub enum BulkOutcome {
    Applied { situation: Situation },
    Skipped { reason: WorkflowError },
}

#[derive(Debug)]
pub struct UnitResult {
    pub subprocess: SubprocessId,
    pub unit: UnitId,
    pub outcome: BulkOutcome,
}

#[derive(Debug, Default)]
pub struct BulkReport {
    pub results: Vec<UnitResult>,
}

impl BulkReport {
    pub fn applied(&self) -> impl Iterator<Item = &UnitResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, BulkOutcome::Applied { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&UnitResult, &WorkflowError)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            BulkOutcome::Skipped { reason } => Some((r, reason)),
            BulkOutcome::Applied { .. } => None,
        })
    }

    pub fn all_applied(&self) -> bool {
        self.skipped().next().is_none()
    }
}

pub struct BulkOperationCoordinator;

impl BulkOperationCoordinator {
    /// Subprocesses for which the action would be offered: exactly those
    /// where the single-unit guard allows it.
    pub fn eligible<'s>(
        action: &BulkAction,
        subprocesses: &'s [Subprocess],
        ctx: &WorkflowContext<'_>,
    ) -> Vec<&'s Subprocess> {
        subprocesses
            .iter()
            .filter(|s| {
                ctx.capabilities(Some(s.unit), GuardSituation::Subprocess(s.situation))
                    .allows(action.action_for(s.situation))
            })
            .collect()
    }

    /// Applies `action` to a copy of `sub` and returns the copy. The
    /// original is never touched.
    pub fn apply_one(
        action: &BulkAction,
        sub: &Subprocess,
        ctx: &WorkflowContext<'_>,
    ) -> WorkflowResult<Subprocess> {
        let mut next = sub.clone();
        match (action, sub.situation.track()) {
            (BulkAction::Accept { comment }, Track::Cadastro) => {
                SubprocessStateMachine::review_cadastro(
                    &mut next,
                    ctx,
                    ReviewOutcome::Accepted,
                    comment.as_deref(),
                )?;
            }
            (BulkAction::Accept { comment }, Track::Mapa) => {
                SubprocessStateMachine::review_mapa(
                    &mut next,
                    ctx,
                    ReviewOutcome::Accepted,
                    comment.as_deref(),
                )?;
            }
            (BulkAction::Homologate { comment }, Track::Cadastro) => {
                SubprocessStateMachine::homologate_cadastro(&mut next, ctx, comment.as_deref())?;
            }
            (BulkAction::Homologate { comment }, Track::Mapa) => {
                SubprocessStateMachine::homologate_mapa(&mut next, ctx, comment.as_deref())?;
            }
            (BulkAction::MakeAvailableMapa(deadline), _) => {
                SubprocessStateMachine::make_available_mapa(&mut next, ctx, *deadline)?;
            }
            (BulkAction::ChangeDeadline(date), _) => {
                SubprocessStateMachine::change_deadline(&mut next, ctx, *date)?;
            }
        }
        Ok(next)
    }

    /// Best-effort application over the selection. `apply` handles one
    /// unit and must leave it untouched when it fails; nothing is retried.
    pub async fn apply_to_selection<F>(subprocesses: &mut [Subprocess], mut apply: F) -> BulkReport
    where
        F: AsyncFnMut(&mut Subprocess) -> WorkflowResult<()>,
    {
        let mut report = BulkReport::default();
        for sub in subprocesses.iter_mut() {
            let outcome = match apply(sub).await {
                Ok(()) => BulkOutcome::Applied {
                    situation: sub.situation,
                },
                Err(reason) => {
                    warn!(subprocess = %sub.id, unit = %sub.unit, %reason, "bulk action skipped");
                    BulkOutcome::Skipped { reason }
                }
            };
            report.results.push(UnitResult {
                subprocess: sub.id,
                unit: sub.unit,
                outcome,
            });
        }
        info!(
            applied = report.applied().count(),
            skipped = report.skipped().count(),
            "bulk action finished"
        );
        report
    }
}
