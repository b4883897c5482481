//! Orquestração das transições contra o serviço remoto.
//!
//! Toda transição segue o mesmo roteiro: guarda e pré-condições avaliadas
//! sobre uma cópia do estado local, requisição ao serviço, e só então a cópia
//! substitui o original. Uma falha de transporte deixa o estado intacto.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::bulk::{BulkAction, BulkOperationCoordinator, BulkReport};
use crate::error::{WorkflowError, WorkflowResult};
use crate::hierarchy::UnitHierarchy;
use crate::model::{Actor, ProcessId, ProcessType, SubprocessId, UnitId};
use crate::remote::adapter::{
    expect_process_situation, hierarchy_from_tree, history_from, parse_situation,
    process_type_code,
};
use crate::remote::types::CriarProcessoRequest;
use crate::remote::{Backend, RemoteError, SubprocessCommand};
use crate::state_machine::{
    CadastroEdit, MapEdit, Movement, Process, ProcessStateMachine, ReviewOutcome, ReviewRecord,
    Situation, Subprocess, SubprocessStateMachine, Track, Transition, WorkflowContext,
};

type InFlight = Arc<Mutex<HashSet<SubprocessId>>>;

/// Marks a subprocess as busy until dropped.
struct InFlightGuard {
    registry: InFlight,
    id: SubprocessId,
}

impl InFlightGuard {
    fn claim(registry: &InFlight, id: SubprocessId) -> WorkflowResult<Self> {
        let mut busy = registry.lock().unwrap_or_else(PoisonError::into_inner);
        if !busy.insert(id) {
            warn!(subprocess = %id, "transition rejected, another one is in flight");
            return Err(WorkflowError::RequestInFlight(id));
        }
        Ok(Self {
            registry: Arc::clone(registry),
            id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Drives processes and subprocesses through their state machines, keeping
/// the remote service as the source of truth.
pub struct WorkflowService<B: Backend> {
    backend: B,
    hierarchy: Arc<UnitHierarchy>,
    in_flight: InFlight,
}

impl<B: Backend> WorkflowService<B> {
    pub fn new(backend: B, hierarchy: UnitHierarchy) -> Self {
        Self {
            backend,
            hierarchy: Arc::new(hierarchy),
            in_flight: Arc::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn hierarchy(&self) -> Arc<UnitHierarchy> {
        Arc::clone(&self.hierarchy)
    }

    /// Context for guarded reads.
    pub fn context<'a>(&'a self, actor: &'a Actor) -> WorkflowContext<'a> {
        WorkflowContext::new(&self.hierarchy, actor)
    }

    /// Replaces the hierarchy with the eligibility tree for `process_type`.
    pub async fn refresh_hierarchy(&mut self, process_type: ProcessType) -> WorkflowResult<()> {
        let tree = self.backend.unit_tree(process_type).await?;
        let hierarchy = hierarchy_from_tree(&tree, process_type)?;
        info!(units = hierarchy.len(), %process_type, "hierarchy refreshed");
        self.hierarchy = Arc::new(hierarchy);
        Ok(())
    }

    pub async fn create_process(
        &self,
        actor: &Actor,
        description: &str,
        process_type: ProcessType,
        deadline: NaiveDate,
        units: &[UnitId],
    ) -> WorkflowResult<Process> {
        let ctx = self.context(actor);
        let mut process =
            ProcessStateMachine::create(ProcessId(0), description, process_type, deadline, &ctx)?;
        if units.is_empty() {
            return Err(WorkflowError::EmptySelection);
        }

        let created = self
            .backend
            .create_process(&CriarProcessoRequest {
                descricao: process.description.clone(),
                tipo: process_type_code(process_type).to_string(),
                data_limite: deadline,
                unidades: units.to_vec(),
            })
            .await?;
        expect_process_situation(&created.situacao, process.situation)?;
        process.id = created.codigo;
        Ok(process)
    }

    /// Starts `process` for `selected`. Subprocess ids come from the service.
    pub async fn start_process(
        &self,
        actor: &Actor,
        process: &mut Process,
        selected: &[UnitId],
    ) -> WorkflowResult<Vec<Subprocess>> {
        let ctx = self.context(actor);
        let mut next = process.clone();
        let mut subprocesses =
            ProcessStateMachine::start(&mut next, &ctx, selected, |_| SubprocessId(0))?;

        let units: Vec<UnitId> = next.participants().collect();
        let started = self.backend.start_process(process.id, &units).await?;
        expect_process_situation(&started.situacao, next.situation)?;
        let mut ids = HashMap::new();
        for summary in &started.subprocessos {
            let (_, situation) = parse_situation(&summary.situacao)?;
            if situation != Situation::INITIAL {
                return Err(RemoteError::UnexpectedSituation {
                    expected: Situation::INITIAL.to_string(),
                    reported: summary.situacao.clone(),
                }
                .into());
            }
            ids.insert(summary.unidade, summary.codigo);
        }
        for sub in &mut subprocesses {
            sub.id = *ids.get(&sub.unit).ok_or_else(|| {
                WorkflowError::from(RemoteError::IncompleteResponse(format!(
                    "no subprocess returned for unit {}",
                    sub.unit
                )))
            })?;
        }

        *process = next;
        Ok(subprocesses)
    }

    pub async fn finish_process(
        &self,
        actor: &Actor,
        process: &mut Process,
        subprocesses: &[Subprocess],
    ) -> WorkflowResult<()> {
        let ctx = self.context(actor);
        let mut next = process.clone();
        ProcessStateMachine::finish(&mut next, &ctx, subprocesses)?;
        self.backend.finish_process(process.id).await?;
        *process = next;
        Ok(())
    }

    async fn run<F>(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
        command: SubprocessCommand,
        apply: F,
    ) -> WorkflowResult<Transition>
    where
        F: FnOnce(&mut Subprocess, &WorkflowContext<'_>) -> WorkflowResult<Transition>,
    {
        let _guard = InFlightGuard::claim(&self.in_flight, sub.id)?;
        let ctx = self.context(actor);
        let mut next = sub.clone();
        let transition = apply(&mut next, &ctx)?;

        if let Err(err) = self.backend.transition(sub.id, &command).await {
            warn!(subprocess = %sub.id, %err, "service rejected transition, local state kept");
            return Err(err.into());
        }
        *sub = next;
        Ok(transition)
    }

    /// Applies one cadastro edit locally and sends it to the service.
    pub async fn edit(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
        edit: CadastroEdit,
    ) -> WorkflowResult<Transition> {
        let command = SubprocessCommand::EditCadastro(edit.clone());
        self.run(actor, sub, command, |s, ctx| {
            SubprocessStateMachine::edit(s, ctx, edit)
        })
        .await
    }

    pub async fn edit_map(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
        edit: MapEdit,
    ) -> WorkflowResult<Transition> {
        let command = SubprocessCommand::EditMap(edit.clone());
        self.run(actor, sub, command, |s, ctx| {
            SubprocessStateMachine::edit_map(s, ctx, edit)
        })
        .await
    }

    pub async fn make_available_cadastro(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
    ) -> WorkflowResult<Transition> {
        self.run(
            actor,
            sub,
            SubprocessCommand::MakeAvailableCadastro,
            SubprocessStateMachine::make_available_cadastro,
        )
        .await
    }

    pub async fn review_cadastro(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
        outcome: ReviewOutcome,
        comment: Option<&str>,
    ) -> WorkflowResult<Transition> {
        let command = match outcome {
            ReviewOutcome::Accepted => SubprocessCommand::AcceptCadastro {
                comment: comment.map(String::from),
            },
            ReviewOutcome::ReturnedForAdjustment => SubprocessCommand::ReturnCadastro {
                reason: comment.unwrap_or_default().trim().to_string(),
            },
        };
        self.run(actor, sub, command, |s, ctx| {
            SubprocessStateMachine::review_cadastro(s, ctx, outcome, comment)
        })
        .await
    }

    pub async fn homologate_cadastro(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
        comment: Option<&str>,
    ) -> WorkflowResult<Transition> {
        let command = SubprocessCommand::HomologateCadastro {
            comment: comment.map(String::from),
        };
        self.run(actor, sub, command, |s, ctx| {
            SubprocessStateMachine::homologate_cadastro(s, ctx, comment)
        })
        .await
    }

    pub async fn reopen_cadastro(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
        justification: &str,
    ) -> WorkflowResult<Transition> {
        let command = SubprocessCommand::ReopenCadastro {
            justification: justification.trim().to_string(),
        };
        self.run(actor, sub, command, |s, ctx| {
            SubprocessStateMachine::reopen_cadastro(s, ctx, justification)
        })
        .await
    }

    pub async fn make_available_mapa(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
        deadline: NaiveDate,
    ) -> WorkflowResult<Transition> {
        self.run(
            actor,
            sub,
            SubprocessCommand::MakeAvailableMapa { deadline },
            |s, ctx| SubprocessStateMachine::make_available_mapa(s, ctx, deadline),
        )
        .await
    }

    pub async fn suggest(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
        text: &str,
    ) -> WorkflowResult<Transition> {
        let command = SubprocessCommand::Suggest {
            text: text.trim().to_string(),
        };
        self.run(actor, sub, command, |s, ctx| {
            SubprocessStateMachine::suggest(s, ctx, text)
        })
        .await
    }

    pub async fn validate(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
    ) -> WorkflowResult<Transition> {
        self.run(
            actor,
            sub,
            SubprocessCommand::Validate,
            SubprocessStateMachine::validate,
        )
        .await
    }

    pub async fn review_mapa(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
        outcome: ReviewOutcome,
        comment: Option<&str>,
    ) -> WorkflowResult<Transition> {
        let command = match outcome {
            ReviewOutcome::Accepted => SubprocessCommand::AcceptMapa {
                comment: comment.map(String::from),
            },
            ReviewOutcome::ReturnedForAdjustment => SubprocessCommand::ReturnMapa {
                reason: comment.unwrap_or_default().trim().to_string(),
            },
        };
        self.run(actor, sub, command, |s, ctx| {
            SubprocessStateMachine::review_mapa(s, ctx, outcome, comment)
        })
        .await
    }

    pub async fn homologate_mapa(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
        comment: Option<&str>,
    ) -> WorkflowResult<Transition> {
        let command = SubprocessCommand::HomologateMapa {
            comment: comment.map(String::from),
        };
        self.run(actor, sub, command, |s, ctx| {
            SubprocessStateMachine::homologate_mapa(s, ctx, comment)
        })
        .await
    }

    pub async fn change_deadline(
        &self,
        actor: &Actor,
        sub: &mut Subprocess,
        deadline: NaiveDate,
    ) -> WorkflowResult<Transition> {
        self.run(
            actor,
            sub,
            SubprocessCommand::ChangeDeadline { deadline },
            |s, ctx| SubprocessStateMachine::change_deadline(s, ctx, deadline),
        )
        .await
    }

    /// Subprocesses of the selection the actor would be offered `action` on.
    pub fn bulk_candidates<'s>(
        &self,
        actor: &Actor,
        action: &BulkAction,
        subprocesses: &'s [Subprocess],
    ) -> Vec<&'s Subprocess> {
        BulkOperationCoordinator::eligible(action, subprocesses, &self.context(actor))
    }

    /// Applies a bulk action unit by unit. Each unit goes through the same
    /// guard, request and commit as the single-unit operation; failures are
    /// reported per unit and never retried.
    pub async fn apply_bulk(
        &self,
        actor: &Actor,
        action: &BulkAction,
        subprocesses: &mut [Subprocess],
    ) -> BulkReport {
        BulkOperationCoordinator::apply_to_selection(subprocesses, async |sub: &mut Subprocess| {
            let command = bulk_command(action, sub.situation.track());
            self.run(actor, sub, command, |s, ctx| {
                let next = BulkOperationCoordinator::apply_one(action, s, ctx)?;
                let transition = Transition {
                    from: s.situation,
                    to: next.situation,
                };
                *s = next;
                Ok(transition)
            })
            .await
            .map(|_| ())
        })
        .await
    }

    pub async fn history(
        &self,
        subprocess: SubprocessId,
    ) -> WorkflowResult<(Vec<Movement>, Vec<ReviewRecord>)> {
        let dto = self.backend.history(subprocess).await?;
        Ok(history_from(dto)?)
    }
}

fn bulk_command(action: &BulkAction, track: Track) -> SubprocessCommand {
    match (action, track) {
        (BulkAction::Accept { comment }, Track::Cadastro) => SubprocessCommand::AcceptCadastro {
            comment: comment.clone(),
        },
        (BulkAction::Accept { comment }, Track::Mapa) => SubprocessCommand::AcceptMapa {
            comment: comment.clone(),
        },
        (BulkAction::Homologate { comment }, Track::Cadastro) => {
            SubprocessCommand::HomologateCadastro {
                comment: comment.clone(),
            }
        }
        (BulkAction::Homologate { comment }, Track::Mapa) => SubprocessCommand::HomologateMapa {
            comment: comment.clone(),
        },
        (BulkAction::MakeAvailableMapa(deadline), _) => SubprocessCommand::MakeAvailableMapa {
            deadline: *deadline,
        },
        (BulkAction::ChangeDeadline(deadline), _) => SubprocessCommand::ChangeDeadline {
            deadline: *deadline,
        },
    }
}
