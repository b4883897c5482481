use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::WorkflowContext;
use super::impact::{self, ImpactReport};
use super::situation::{CadastroState, MapaState, Situation, Track, Variant};
use crate::error::{WorkflowError, WorkflowResult};
use crate::model::{ActivityId, CompetencyId, KnowledgeId, ProcessId, SubprocessId, UnitId};
use crate::permission::{Action, GuardSituation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Knowledge {
    pub id: KnowledgeId,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub description: String,
    pub knowledge: Vec<Knowledge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competency {
    pub id: CompetencyId,
    pub description: String,
    pub activities: Vec<ActivityId>,
}

/// The map in force for a unit when a revision starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapBaseline {
    pub activities: Vec<Activity>,
    pub competencies: Vec<Competency>,
}

/// Custody change. `from` is empty only for the opening movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub at: DateTime<Utc>,
    pub from: Option<UnitId>,
    pub to: UnitId,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewOutcome {
    Accepted,
    ReturnedForAdjustment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub at: DateTime<Utc>,
    pub unit: UnitId,
    pub reviewer: String,
    pub outcome: ReviewOutcome,
    pub comment: Option<String>,
    pub track: Track,
}

/// One change to the activity/knowledge inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CadastroEdit {
    AddActivity {
        id: ActivityId,
        description: String,
    },
    RenameActivity {
        id: ActivityId,
        description: String,
    },
    RemoveActivity(ActivityId),
    AddKnowledge {
        activity: ActivityId,
        id: KnowledgeId,
        description: String,
    },
    RemoveKnowledge {
        activity: ActivityId,
        id: KnowledgeId,
    },
}

/// One change to the competency map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapEdit {
    AddCompetency {
        id: CompetencyId,
        description: String,
        activities: Vec<ActivityId>,
    },
    UpdateCompetency {
        id: CompetencyId,
        description: String,
        activities: Vec<ActivityId>,
    },
    RemoveCompetency(CompetencyId),
}

/// The workflow of one unit inside a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subprocess {
    pub id: SubprocessId,
    pub process: ProcessId,
    pub unit: UnitId,
    pub variant: Variant,
    pub situation: Situation,
    pub activities: Vec<Activity>,
    pub competencies: Vec<Competency>,
    pub suggestions: Option<String>,
    pub cadastro_deadline: NaiveDate,
    pub mapa_deadline: Option<NaiveDate>,
    pub baseline: Option<MapBaseline>,
    pub movements: Vec<Movement>,
    pub reviews: Vec<ReviewRecord>,
}

impl Subprocess {
    pub fn new(
        id: SubprocessId,
        process: ProcessId,
        unit: UnitId,
        variant: Variant,
        cadastro_deadline: NaiveDate,
    ) -> Self {
        let opening = match variant {
            Variant::Mapping => "Processo iniciado",
            Variant::Revision => "Processo de revisão iniciado",
        };
        Self {
            id,
            process,
            unit,
            variant,
            situation: Situation::INITIAL,
            activities: Vec::new(),
            competencies: Vec::new(),
            suggestions: None,
            cadastro_deadline,
            mapa_deadline: None,
            baseline: None,
            movements: vec![Movement {
                at: Utc::now(),
                from: None,
                to: unit,
                description: opening.to_string(),
            }],
            reviews: Vec::new(),
        }
    }

    /// Seeds a revision with the map currently in force: the cadastro starts
    /// as a copy of it and impact is measured against it.
    pub fn with_baseline(mut self, baseline: MapBaseline) -> Self {
        self.activities = baseline.activities.clone();
        self.competencies = baseline.competencies.clone();
        self.baseline = Some(baseline);
        self
    }

    /// Situation label as recorded in the audit trail.
    pub fn label(&self) -> String {
        self.situation.label(self.variant)
    }

    fn guard(&self) -> GuardSituation {
        GuardSituation::Subprocess(self.situation)
    }

    pub fn activities_without_knowledge(&self) -> Vec<ActivityId> {
        self.activities
            .iter()
            .filter(|a| a.knowledge.is_empty())
            .map(|a| a.id)
            .collect()
    }

    /// Impact of the current cadastro against the baseline. Empty when the
    /// unit had no map in force.
    pub fn impact(&self) -> ImpactReport {
        match &self.baseline {
            Some(b) => impact::diff(&b.activities, &b.competencies, &self.activities),
            None => ImpactReport::default(),
        }
    }

    fn activity_mut(&mut self, id: ActivityId) -> WorkflowResult<&mut Activity> {
        self.activities
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(WorkflowError::UnknownActivity(id))
    }
}

/// Situation change produced by a subprocess operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Situation,
    pub to: Situation,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

fn non_blank(value: &str, field: &'static str) -> WorkflowResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(WorkflowError::BlankField { field })
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional_comment(comment: Option<&str>) -> Option<String> {
    comment
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
}

/// Drives a [`Subprocess`] through the cadastro and mapa tracks.
///
/// Each operation checks the guard first, then its preconditions, and only
/// then mutates. An `Err` always leaves the subprocess untouched.
pub struct SubprocessStateMachine;

impl SubprocessStateMachine {
    fn advance(
        sub: &mut Subprocess,
        to: Situation,
        from_unit: UnitId,
        to_unit: UnitId,
        description: &str,
    ) -> Transition {
        let transition = Transition {
            from: sub.situation,
            to,
        };
        sub.situation = to;
        sub.movements.push(Movement {
            at: Utc::now(),
            from: Some(from_unit),
            to: to_unit,
            description: description.to_string(),
        });
        info!(
            subprocess = %sub.id,
            unit = %sub.unit,
            from = %transition.from.label(sub.variant),
            to = %transition.to.label(sub.variant),
            "{description}"
        );
        transition
    }

    fn record_review(
        sub: &mut Subprocess,
        ctx: &WorkflowContext<'_>,
        outcome: ReviewOutcome,
        comment: Option<String>,
        track: Track,
    ) {
        sub.reviews.push(ReviewRecord {
            at: Utc::now(),
            unit: ctx.actor.unit(),
            reviewer: ctx.actor.person.clone(),
            outcome,
            comment,
            track,
        });
    }

    fn superior_of(ctx: &WorkflowContext<'_>, unit: UnitId) -> UnitId {
        ctx.hierarchy.parent(unit).map_or(unit, |p| p.id)
    }

    /// Applies one edit to the cadastro. The first edit opens the track.
    pub fn edit(
        sub: &mut Subprocess,
        ctx: &WorkflowContext<'_>,
        edit: CadastroEdit,
    ) -> WorkflowResult<Transition> {
        ctx.require(Action::EditCadastro, Some(sub.unit), sub.guard())?;

        match edit {
            CadastroEdit::AddActivity { id, description } => {
                let description = non_blank(&description, "activity description")?;
                if sub.activities.iter().any(|a| a.id == id) {
                    return Err(WorkflowError::DuplicateActivity(id));
                }
                sub.activities.push(Activity {
                    id,
                    description,
                    knowledge: Vec::new(),
                });
            }
            CadastroEdit::RenameActivity { id, description } => {
                let description = non_blank(&description, "activity description")?;
                sub.activity_mut(id)?.description = description;
            }
            CadastroEdit::RemoveActivity(id) => {
                let before = sub.activities.len();
                sub.activities.retain(|a| a.id != id);
                if sub.activities.len() == before {
                    return Err(WorkflowError::UnknownActivity(id));
                }
                for competency in &mut sub.competencies {
                    competency.activities.retain(|a| *a != id);
                }
            }
            CadastroEdit::AddKnowledge {
                activity,
                id,
                description,
            } => {
                let description = non_blank(&description, "knowledge description")?;
                sub.activity_mut(activity)?
                    .knowledge
                    .push(Knowledge { id, description });
            }
            CadastroEdit::RemoveKnowledge { activity, id } => {
                let knowledge = &mut sub.activity_mut(activity)?.knowledge;
                let before = knowledge.len();
                knowledge.retain(|k| k.id != id);
                if knowledge.len() == before {
                    return Err(WorkflowError::UnknownKnowledge(id));
                }
            }
        }

        let from = sub.situation;
        if from == Situation::Cadastro(CadastroState::NotStarted) {
            sub.situation = Situation::Cadastro(CadastroState::InProgress);
            info!(subprocess = %sub.id, unit = %sub.unit, "cadastro started");
        }
        Ok(Transition {
            from,
            to: sub.situation,
        })
    }

    pub fn make_available_cadastro(
        sub: &mut Subprocess,
        ctx: &WorkflowContext<'_>,
    ) -> WorkflowResult<Transition> {
        ctx.require(Action::MakeAvailableCadastro, Some(sub.unit), sub.guard())?;

        if sub.activities.is_empty() {
            return Err(WorkflowError::NoActivities);
        }
        let incomplete = sub.activities_without_knowledge();
        if !incomplete.is_empty() {
            return Err(WorkflowError::IncompleteActivities {
                activities: incomplete,
            });
        }

        let superior = Self::superior_of(ctx, sub.unit);
        Ok(Self::advance(
            sub,
            Situation::Cadastro(CadastroState::MadeAvailable),
            sub.unit,
            superior,
            "Cadastro de atividades disponibilizado",
        ))
    }

    /// Accept or return a cadastro that was made available.
    ///
    /// Returning requires a reason; accepting homologates the cadastro.
    pub fn review_cadastro(
        sub: &mut Subprocess,
        ctx: &WorkflowContext<'_>,
        outcome: ReviewOutcome,
        comment: Option<&str>,
    ) -> WorkflowResult<Transition> {
        let reviewer = ctx.actor.unit();
        match outcome {
            ReviewOutcome::Accepted => {
                ctx.require(Action::AcceptCadastro, Some(sub.unit), sub.guard())?;
                Self::record_review(sub, ctx, outcome, optional_comment(comment), Track::Cadastro);
                Ok(Self::advance(
                    sub,
                    Situation::Cadastro(CadastroState::Homologated),
                    reviewer,
                    reviewer,
                    "Cadastro de atividades aceito",
                ))
            }
            ReviewOutcome::ReturnedForAdjustment => {
                ctx.require(Action::ReturnCadastro, Some(sub.unit), sub.guard())?;
                let reason = non_blank(comment.unwrap_or_default(), "return reason")?;
                Self::record_review(sub, ctx, outcome, Some(reason), Track::Cadastro);
                Ok(Self::advance(
                    sub,
                    Situation::Cadastro(CadastroState::InProgress),
                    reviewer,
                    sub.unit,
                    "Cadastro de atividades devolvido para ajustes",
                ))
            }
        }
    }

    /// Final acceptance of the cadastro by the administration.
    ///
    /// A revision whose cadastro matches the map in force needs no map work
    /// and closes straight away.
    pub fn homologate_cadastro(
        sub: &mut Subprocess,
        ctx: &WorkflowContext<'_>,
        comment: Option<&str>,
    ) -> WorkflowResult<Transition> {
        ctx.require(Action::HomologateCadastro, Some(sub.unit), sub.guard())?;

        let reviewer = ctx.actor.unit();
        let unchanged_revision =
            sub.variant == Variant::Revision && sub.baseline.is_some() && sub.impact().is_empty();
        Self::record_review(
            sub,
            ctx,
            ReviewOutcome::Accepted,
            optional_comment(comment),
            Track::Cadastro,
        );

        if unchanged_revision {
            if let Some(baseline) = &sub.baseline {
                sub.competencies = baseline.competencies.clone();
            }
            return Ok(Self::advance(
                sub,
                Situation::Mapa(MapaState::Homologated),
                reviewer,
                reviewer,
                "Cadastro de atividades homologado sem impacto no mapa",
            ));
        }

        Ok(Self::advance(
            sub,
            Situation::Cadastro(CadastroState::Homologated),
            reviewer,
            reviewer,
            "Cadastro de atividades homologado",
        ))
    }

    /// Sends the subprocess back to cadastro editing.
    pub fn reopen_cadastro(
        sub: &mut Subprocess,
        ctx: &WorkflowContext<'_>,
        justification: &str,
    ) -> WorkflowResult<Transition> {
        ctx.require(Action::ReopenCadastro, Some(sub.unit), sub.guard())?;
        let justification = non_blank(justification, "justification")?;

        sub.suggestions = None;
        Ok(Self::advance(
            sub,
            Situation::Cadastro(CadastroState::InProgress),
            ctx.actor.unit(),
            sub.unit,
            &format!("Reabertura de cadastro: {justification}"),
        ))
    }

    /// Applies one edit to the competency map.
    ///
    /// The first competency on a homologated cadastro opens the mapa track;
    /// removing the last one from a freshly created map closes it again.
    pub fn edit_map(
        sub: &mut Subprocess,
        ctx: &WorkflowContext<'_>,
        edit: MapEdit,
    ) -> WorkflowResult<Transition> {
        ctx.require(Action::EditMap, Some(sub.unit), sub.guard())?;

        let known = |sub: &Subprocess, ids: &[ActivityId]| -> WorkflowResult<()> {
            match ids.iter().find(|id| !sub.activities.iter().any(|a| a.id == **id)) {
                Some(missing) => Err(WorkflowError::UnknownActivity(*missing)),
                None => Ok(()),
            }
        };

        match edit {
            MapEdit::AddCompetency {
                id,
                description,
                activities,
            } => {
                let description = non_blank(&description, "competency description")?;
                known(sub, &activities)?;
                if sub.competencies.iter().any(|c| c.id == id) {
                    return Err(WorkflowError::DuplicateCompetency(id));
                }
                sub.competencies.push(Competency {
                    id,
                    description,
                    activities,
                });
            }
            MapEdit::UpdateCompetency {
                id,
                description,
                activities,
            } => {
                let description = non_blank(&description, "competency description")?;
                known(sub, &activities)?;
                let competency = sub
                    .competencies
                    .iter_mut()
                    .find(|c| c.id == id)
                    .ok_or(WorkflowError::UnknownCompetency(id))?;
                competency.description = description;
                competency.activities = activities;
            }
            MapEdit::RemoveCompetency(id) => {
                let before = sub.competencies.len();
                sub.competencies.retain(|c| c.id != id);
                if sub.competencies.len() == before {
                    return Err(WorkflowError::UnknownCompetency(id));
                }
            }
        }

        let from = sub.situation;
        let to = match from {
            Situation::Cadastro(CadastroState::Homologated) if !sub.competencies.is_empty() => {
                Situation::Mapa(MapaState::Created)
            }
            Situation::Mapa(MapaState::Created) if sub.competencies.is_empty() => {
                Situation::Cadastro(CadastroState::Homologated)
            }
            other => other,
        };
        if to != from {
            sub.situation = to;
            info!(subprocess = %sub.id, from = %from, to = %to, "map edited");
        }
        Ok(Transition { from, to })
    }

    pub fn make_available_mapa(
        sub: &mut Subprocess,
        ctx: &WorkflowContext<'_>,
        deadline: NaiveDate,
    ) -> WorkflowResult<Transition> {
        ctx.require(Action::MakeAvailableMapa, Some(sub.unit), sub.guard())?;

        let empty: Vec<CompetencyId> = sub
            .competencies
            .iter()
            .filter(|c| c.activities.is_empty())
            .map(|c| c.id)
            .collect();
        if !empty.is_empty() {
            return Err(WorkflowError::EmptyCompetencies {
                competencies: empty,
            });
        }
        let unassociated: Vec<ActivityId> = sub
            .activities
            .iter()
            .filter(|a| !sub.competencies.iter().any(|c| c.activities.contains(&a.id)))
            .map(|a| a.id)
            .collect();
        if !unassociated.is_empty() {
            return Err(WorkflowError::UnassociatedActivities {
                activities: unassociated,
            });
        }

        sub.suggestions = None;
        sub.mapa_deadline = Some(deadline);
        Ok(Self::advance(
            sub,
            Situation::Mapa(MapaState::MadeAvailable),
            ctx.actor.unit(),
            sub.unit,
            "Mapa de competências disponibilizado",
        ))
    }

    /// Advisory suggestions from the unit; no review record is kept.
    pub fn suggest(
        sub: &mut Subprocess,
        ctx: &WorkflowContext<'_>,
        text: &str,
    ) -> WorkflowResult<Transition> {
        ctx.require(Action::Suggest, Some(sub.unit), sub.guard())?;
        let text = non_blank(text, "suggestions")?;

        sub.suggestions = Some(text);
        let superior = Self::superior_of(ctx, sub.unit);
        Ok(Self::advance(
            sub,
            Situation::Mapa(MapaState::WithSuggestions),
            sub.unit,
            superior,
            "Sugestões apresentadas para o mapa de competências",
        ))
    }

    pub fn validate(sub: &mut Subprocess, ctx: &WorkflowContext<'_>) -> WorkflowResult<Transition> {
        ctx.require(Action::Validate, Some(sub.unit), sub.guard())?;

        let superior = Self::superior_of(ctx, sub.unit);
        Ok(Self::advance(
            sub,
            Situation::Mapa(MapaState::Validated),
            sub.unit,
            superior,
            "Validação do mapa de competências",
        ))
    }

    pub fn review_mapa(
        sub: &mut Subprocess,
        ctx: &WorkflowContext<'_>,
        outcome: ReviewOutcome,
        comment: Option<&str>,
    ) -> WorkflowResult<Transition> {
        let reviewer = ctx.actor.unit();
        match outcome {
            ReviewOutcome::Accepted => {
                ctx.require(Action::AcceptMapa, Some(sub.unit), sub.guard())?;
                Self::record_review(sub, ctx, outcome, optional_comment(comment), Track::Mapa);
                Ok(Self::advance(
                    sub,
                    Situation::Mapa(MapaState::Homologated),
                    reviewer,
                    reviewer,
                    "Mapa de competências aceito",
                ))
            }
            ReviewOutcome::ReturnedForAdjustment => {
                ctx.require(Action::ReturnMapa, Some(sub.unit), sub.guard())?;
                let reason = non_blank(comment.unwrap_or_default(), "return reason")?;
                Self::record_review(sub, ctx, outcome, Some(reason), Track::Mapa);
                Ok(Self::advance(
                    sub,
                    Situation::Mapa(MapaState::MadeAvailable),
                    reviewer,
                    sub.unit,
                    "Devolução da validação do mapa de competências",
                ))
            }
        }
    }

    pub fn homologate_mapa(
        sub: &mut Subprocess,
        ctx: &WorkflowContext<'_>,
        comment: Option<&str>,
    ) -> WorkflowResult<Transition> {
        ctx.require(Action::HomologateMapa, Some(sub.unit), sub.guard())?;

        let reviewer = ctx.actor.unit();
        Self::record_review(
            sub,
            ctx,
            ReviewOutcome::Accepted,
            optional_comment(comment),
            Track::Mapa,
        );
        Ok(Self::advance(
            sub,
            Situation::Mapa(MapaState::Homologated),
            reviewer,
            reviewer,
            "Mapa de competências homologado",
        ))
    }

    /// Moves the deadline of whichever track is open.
    pub fn change_deadline(
        sub: &mut Subprocess,
        ctx: &WorkflowContext<'_>,
        deadline: NaiveDate,
    ) -> WorkflowResult<Transition> {
        ctx.require(Action::ChangeDeadline, Some(sub.unit), sub.guard())?;

        match sub.situation.track() {
            Track::Cadastro => sub.cadastro_deadline = deadline,
            Track::Mapa => sub.mapa_deadline = Some(deadline),
        }
        info!(subprocess = %sub.id, %deadline, track = %sub.situation.track(), "deadline changed");
        Ok(Transition {
            from: sub.situation,
            to: sub.situation,
        })
    }

    /// Guarded read of [`Subprocess::impact`].
    pub fn impact(sub: &Subprocess, ctx: &WorkflowContext<'_>) -> WorkflowResult<ImpactReport> {
        ctx.require(Action::ViewImpact, Some(sub.unit), sub.guard())?;
        Ok(sub.impact())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hierarchy::UnitHierarchy;
    use crate::hierarchy::tests::sample;
    use crate::model::{Actor, Role};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, day).unwrap()
    }

    fn fresh(variant: Variant) -> Subprocess {
        Subprocess::new(SubprocessId(1), ProcessId(1), UnitId(4), variant, date(30))
    }

    fn add_activity(id: u64, description: &str) -> CadastroEdit {
        CadastroEdit::AddActivity {
            id: ActivityId(id),
            description: description.to_string(),
        }
    }

    fn add_knowledge(activity: u64, id: u64) -> CadastroEdit {
        CadastroEdit::AddKnowledge {
            activity: ActivityId(activity),
            id: KnowledgeId(id),
            description: format!("Conhecimento {id}"),
        }
    }

    struct Actors {
        tree: UnitHierarchy,
        head: Actor,
        manager: Actor,
        admin: Actor,
    }

    impl Actors {
        fn new() -> Self {
            Self {
                tree: sample(),
                head: Actor::new("chefe", Role::UnitHead, UnitId(4)),
                manager: Actor::new("gestor", Role::Manager, UnitId(2)),
                admin: Actor::new("admin", Role::Admin, UnitId(1)),
            }
        }

        fn head(&self) -> WorkflowContext<'_> {
            WorkflowContext::new(&self.tree, &self.head)
        }

        fn manager(&self) -> WorkflowContext<'_> {
            WorkflowContext::new(&self.tree, &self.manager)
        }

        fn admin(&self) -> WorkflowContext<'_> {
            WorkflowContext::new(&self.tree, &self.admin)
        }
    }

    fn homologated_cadastro(a: &Actors) -> Subprocess {
        let mut sub = fresh(Variant::Mapping);
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_activity(1, "Analisar processos"))
            .unwrap();
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_knowledge(1, 10)).unwrap();
        SubprocessStateMachine::make_available_cadastro(&mut sub, &a.head()).unwrap();
        SubprocessStateMachine::homologate_cadastro(&mut sub, &a.admin(), None).unwrap();
        sub
    }

    fn map_with_competency(a: &Actors) -> Subprocess {
        let mut sub = homologated_cadastro(a);
        SubprocessStateMachine::edit_map(
            &mut sub,
            &a.admin(),
            MapEdit::AddCompetency {
                id: CompetencyId(1),
                description: "Modelagem".into(),
                activities: vec![ActivityId(1)],
            },
        )
        .unwrap();
        sub
    }

    #[test]
    fn first_edit_starts_cadastro() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Mapping);
        let t = SubprocessStateMachine::edit(&mut sub, &a.head(), add_activity(1, "Atividade"))
            .unwrap();
        assert_eq!(t.from, Situation::INITIAL);
        assert_eq!(t.to, Situation::Cadastro(CadastroState::InProgress));
        assert!(t.changed());

        let t = SubprocessStateMachine::edit(&mut sub, &a.head(), add_knowledge(1, 1)).unwrap();
        assert!(!t.changed());
    }

    #[test]
    fn blank_edit_is_rejected_without_starting() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Mapping);
        let err =
            SubprocessStateMachine::edit(&mut sub, &a.head(), add_activity(1, "  ")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(sub.situation, Situation::INITIAL);
    }

    #[test]
    fn duplicate_activity_id_is_rejected() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Mapping);
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_activity(1, "A")).unwrap();

        let err = SubprocessStateMachine::edit(&mut sub, &a.head(), add_activity(1, "B"))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateActivity(ActivityId(1))));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(sub.activities.len(), 1);
        assert_eq!(sub.activities[0].description, "A");
    }

    #[test]
    fn removing_unknown_knowledge_fails() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Mapping);
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_activity(1, "A")).unwrap();
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_knowledge(1, 10)).unwrap();

        let remove = |id| CadastroEdit::RemoveKnowledge {
            activity: ActivityId(1),
            id: KnowledgeId(id),
        };
        let err = SubprocessStateMachine::edit(&mut sub, &a.head(), remove(99)).unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownKnowledge(KnowledgeId(99))));
        assert_eq!(sub.activities[0].knowledge.len(), 1);

        SubprocessStateMachine::edit(&mut sub, &a.head(), remove(10)).unwrap();
        assert!(sub.activities[0].knowledge.is_empty());
    }

    #[test]
    fn duplicate_competency_id_is_rejected() {
        let a = Actors::new();
        let mut sub = map_with_competency(&a);
        let err = SubprocessStateMachine::edit_map(
            &mut sub,
            &a.admin(),
            MapEdit::AddCompetency {
                id: CompetencyId(1),
                description: "Outra".into(),
                activities: vec![ActivityId(1)],
            },
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateCompetency(CompetencyId(1))));
        assert_eq!(sub.competencies.len(), 1);
    }

    #[test]
    fn superior_cannot_edit_unit_cadastro() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Mapping);
        let head_of_parent = Actor::new("chefe2", Role::UnitHead, UnitId(2));
        let ctx = WorkflowContext::new(&a.tree, &head_of_parent);
        let err = SubprocessStateMachine::edit(&mut sub, &ctx, add_activity(1, "x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[test]
    fn make_available_needs_knowledge_everywhere() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Mapping);
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_activity(1, "A")).unwrap();
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_activity(2, "B")).unwrap();
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_knowledge(1, 1)).unwrap();
        let before = sub.clone();

        let err = SubprocessStateMachine::make_available_cadastro(&mut sub, &a.head()).unwrap_err();
        match err {
            WorkflowError::IncompleteActivities { activities } => {
                assert_eq!(activities, vec![ActivityId(2)])
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sub, before);

        SubprocessStateMachine::edit(&mut sub, &a.head(), add_knowledge(2, 2)).unwrap();
        let t = SubprocessStateMachine::make_available_cadastro(&mut sub, &a.head()).unwrap();
        assert_eq!(t.to, Situation::Cadastro(CadastroState::MadeAvailable));
        let last = sub.movements.last().unwrap();
        assert_eq!((last.from, last.to), (Some(UnitId(4)), UnitId(2)));
    }

    #[test]
    fn make_available_needs_an_activity() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Mapping);
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_activity(1, "A")).unwrap();
        let remove = CadastroEdit::RemoveActivity(ActivityId(1));
        SubprocessStateMachine::edit(&mut sub, &a.head(), remove).unwrap();
        assert!(matches!(
            SubprocessStateMachine::make_available_cadastro(&mut sub, &a.head()),
            Err(WorkflowError::NoActivities)
        ));
    }

    #[test]
    fn staff_cannot_make_available() {
        let a = Actors::new();
        let staff = Actor::new("servidor", Role::Staff, UnitId(4));
        let ctx = WorkflowContext::new(&a.tree, &staff);
        let mut sub = fresh(Variant::Mapping);
        SubprocessStateMachine::edit(&mut sub, &ctx, add_activity(1, "A")).unwrap();
        SubprocessStateMachine::edit(&mut sub, &ctx, add_knowledge(1, 1)).unwrap();
        let err = SubprocessStateMachine::make_available_cadastro(&mut sub, &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[test]
    fn return_requires_reason_and_reopens_editing() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Mapping);
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_activity(1, "A")).unwrap();
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_knowledge(1, 1)).unwrap();
        SubprocessStateMachine::make_available_cadastro(&mut sub, &a.head()).unwrap();

        let err = SubprocessStateMachine::review_cadastro(
            &mut sub,
            &a.manager(),
            ReviewOutcome::ReturnedForAdjustment,
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(sub.reviews.is_empty());

        let t = SubprocessStateMachine::review_cadastro(
            &mut sub,
            &a.manager(),
            ReviewOutcome::ReturnedForAdjustment,
            Some("Detalhar conhecimentos"),
        )
        .unwrap();
        assert_eq!(t.to, Situation::Cadastro(CadastroState::InProgress));
        assert_eq!(sub.reviews.len(), 1);
        assert_eq!(sub.reviews[0].track, Track::Cadastro);
        assert_eq!(sub.reviews[0].comment.as_deref(), Some("Detalhar conhecimentos"));
        assert_eq!(sub.movements.last().unwrap().to, UnitId(4));
    }

    #[test]
    fn manager_accept_homologates_cadastro() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Mapping);
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_activity(1, "A")).unwrap();
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_knowledge(1, 1)).unwrap();
        SubprocessStateMachine::make_available_cadastro(&mut sub, &a.head()).unwrap();

        let t = SubprocessStateMachine::review_cadastro(
            &mut sub,
            &a.manager(),
            ReviewOutcome::Accepted,
            None,
        )
        .unwrap();
        assert_eq!(t.to, Situation::Cadastro(CadastroState::Homologated));
        assert_eq!(sub.reviews[0].reviewer, "gestor");
        assert_eq!(sub.reviews[0].outcome, ReviewOutcome::Accepted);
    }

    #[test]
    fn map_track_round_trip() {
        let a = Actors::new();
        let mut sub = map_with_competency(&a);
        assert_eq!(sub.situation, Situation::Mapa(MapaState::Created));

        SubprocessStateMachine::make_available_mapa(&mut sub, &a.admin(), date(20)).unwrap();
        assert_eq!(sub.mapa_deadline, Some(date(20)));

        let reviews_before = sub.reviews.len();
        SubprocessStateMachine::suggest(&mut sub, &a.head(), "Incluir competência de gestão")
            .unwrap();
        assert_eq!(sub.situation, Situation::Mapa(MapaState::WithSuggestions));
        assert_eq!(sub.reviews.len(), reviews_before);
        assert!(sub.reviews.iter().all(|r| r.track == Track::Cadastro));

        // Republishing clears the suggestions.
        SubprocessStateMachine::make_available_mapa(&mut sub, &a.admin(), date(25)).unwrap();
        assert!(sub.suggestions.is_none());

        SubprocessStateMachine::validate(&mut sub, &a.head()).unwrap();
        SubprocessStateMachine::review_mapa(
            &mut sub,
            &a.manager(),
            ReviewOutcome::ReturnedForAdjustment,
            Some("Rever descrições"),
        )
        .unwrap();
        assert_eq!(sub.situation, Situation::Mapa(MapaState::MadeAvailable));

        SubprocessStateMachine::validate(&mut sub, &a.head()).unwrap();
        let t = SubprocessStateMachine::review_mapa(
            &mut sub,
            &a.manager(),
            ReviewOutcome::Accepted,
            None,
        )
        .unwrap();
        assert_eq!(t.to, Situation::Mapa(MapaState::Homologated));
        assert!(sub.situation.is_terminal());
        assert_eq!(sub.reviews.iter().filter(|r| r.track == Track::Mapa).count(), 2);
    }

    #[test]
    fn map_needs_full_coverage_before_publishing() {
        let a = Actors::new();
        let mut sub = map_with_competency(&a);
        SubprocessStateMachine::edit_map(
            &mut sub,
            &a.admin(),
            MapEdit::AddCompetency {
                id: CompetencyId(2),
                description: "Vazia".into(),
                activities: vec![],
            },
        )
        .unwrap();
        assert!(matches!(
            SubprocessStateMachine::make_available_mapa(&mut sub, &a.admin(), date(20)),
            Err(WorkflowError::EmptyCompetencies { ref competencies })
                if competencies == &[CompetencyId(2)]
        ));

        let remove = MapEdit::RemoveCompetency(CompetencyId(2));
        SubprocessStateMachine::edit_map(&mut sub, &a.admin(), remove).unwrap();
        SubprocessStateMachine::edit_map(
            &mut sub,
            &a.admin(),
            MapEdit::UpdateCompetency {
                id: CompetencyId(1),
                description: "Modelagem".into(),
                activities: vec![],
            },
        )
        .unwrap();
        SubprocessStateMachine::edit_map(
            &mut sub,
            &a.admin(),
            MapEdit::AddCompetency {
                id: CompetencyId(3),
                description: "Outra".into(),
                activities: vec![ActivityId(1)],
            },
        )
        .unwrap();
        let remove = MapEdit::RemoveCompetency(CompetencyId(1));
        SubprocessStateMachine::edit_map(&mut sub, &a.admin(), remove).unwrap();
        SubprocessStateMachine::make_available_mapa(&mut sub, &a.admin(), date(20)).unwrap();
    }

    #[test]
    fn unassociated_activity_blocks_publishing() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Mapping);
        for edit in [
            add_activity(1, "A"),
            add_knowledge(1, 1),
            add_activity(2, "B"),
            add_knowledge(2, 2),
        ] {
            SubprocessStateMachine::edit(&mut sub, &a.head(), edit).unwrap();
        }
        SubprocessStateMachine::make_available_cadastro(&mut sub, &a.head()).unwrap();
        SubprocessStateMachine::homologate_cadastro(&mut sub, &a.admin(), None).unwrap();
        SubprocessStateMachine::edit_map(
            &mut sub,
            &a.admin(),
            MapEdit::AddCompetency {
                id: CompetencyId(1),
                description: "C".into(),
                activities: vec![ActivityId(1)],
            },
        )
        .unwrap();
        let err = SubprocessStateMachine::make_available_mapa(&mut sub, &a.admin(), date(20))
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::UnassociatedActivities { ref activities }
                if activities == &[ActivityId(2)]
        ));
    }

    #[test]
    fn removing_last_competency_closes_map() {
        let a = Actors::new();
        let mut sub = map_with_competency(&a);
        let remove = MapEdit::RemoveCompetency(CompetencyId(1));
        let t = SubprocessStateMachine::edit_map(&mut sub, &a.admin(), remove).unwrap();
        assert_eq!(t.to, Situation::Cadastro(CadastroState::Homologated));
    }

    #[test]
    fn edit_map_rejects_unknown_activity() {
        let a = Actors::new();
        let mut sub = homologated_cadastro(&a);
        let err = SubprocessStateMachine::edit_map(
            &mut sub,
            &a.admin(),
            MapEdit::AddCompetency {
                id: CompetencyId(1),
                description: "C".into(),
                activities: vec![ActivityId(99)],
            },
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownActivity(ActivityId(99))));
        assert_eq!(sub.situation, Situation::Cadastro(CadastroState::Homologated));
    }

    #[test]
    fn reopen_returns_to_editing() {
        let a = Actors::new();
        let mut sub = map_with_competency(&a);
        assert!(SubprocessStateMachine::reopen_cadastro(&mut sub, &a.admin(), " ").is_err());
        let t = SubprocessStateMachine::reopen_cadastro(&mut sub, &a.admin(), "Erro na descrição")
            .unwrap();
        assert_eq!(t.to, Situation::Cadastro(CadastroState::InProgress));
        assert!(sub.movements.last().unwrap().description.starts_with("Reabertura de cadastro"));
    }

    #[test]
    fn deadline_follows_open_track() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Mapping);
        SubprocessStateMachine::change_deadline(&mut sub, &a.admin(), date(10)).unwrap();
        assert_eq!(sub.cadastro_deadline, date(10));

        let mut sub = map_with_competency(&a);
        SubprocessStateMachine::change_deadline(&mut sub, &a.admin(), date(12)).unwrap();
        assert_eq!(sub.mapa_deadline, Some(date(12)));

        sub.situation = Situation::Mapa(MapaState::Homologated);
        assert!(SubprocessStateMachine::change_deadline(&mut sub, &a.admin(), date(13)).is_err());
    }

    fn baseline() -> MapBaseline {
        MapBaseline {
            activities: vec![Activity {
                id: ActivityId(1),
                description: "Analisar processos".into(),
                knowledge: vec![Knowledge {
                    id: KnowledgeId(1),
                    description: "BPMN".into(),
                }],
            }],
            competencies: vec![Competency {
                id: CompetencyId(1),
                description: "Modelagem".into(),
                activities: vec![ActivityId(1)],
            }],
        }
    }

    #[test]
    fn unchanged_revision_closes_on_homologation() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Revision).with_baseline(baseline());
        SubprocessStateMachine::edit(
            &mut sub,
            &a.head(),
            CadastroEdit::RenameActivity {
                id: ActivityId(1),
                description: "Analisar processos".into(),
            },
        )
        .unwrap();
        SubprocessStateMachine::make_available_cadastro(&mut sub, &a.head()).unwrap();
        assert!(SubprocessStateMachine::impact(&sub, &a.manager()).unwrap().is_empty());

        let t = SubprocessStateMachine::homologate_cadastro(&mut sub, &a.admin(), None).unwrap();
        assert_eq!(t.to, Situation::Mapa(MapaState::Homologated));
        assert_eq!(sub.label(), "REVISION_MAPA_HOMOLOGATED");
    }

    #[test]
    fn changed_revision_reports_impact() {
        let a = Actors::new();
        let mut sub = fresh(Variant::Revision).with_baseline(baseline());
        SubprocessStateMachine::edit(&mut sub, &a.head(), add_knowledge(1, 2)).unwrap();

        let report = SubprocessStateMachine::impact(&sub, &a.head()).unwrap();
        assert_eq!(report.knowledge_changed().count(), 1);
        assert_eq!(report.impacted.len(), 1);

        SubprocessStateMachine::make_available_cadastro(&mut sub, &a.head()).unwrap();
        let t = SubprocessStateMachine::homologate_cadastro(&mut sub, &a.admin(), None).unwrap();
        assert_eq!(t.to, Situation::Cadastro(CadastroState::Homologated));
    }

    #[test]
    fn staff_cannot_view_impact() {
        let a = Actors::new();
        let staff = Actor::new("servidor", Role::Staff, UnitId(4));
        let sub = fresh(Variant::Revision).with_baseline(baseline());
        let ctx = WorkflowContext::new(&a.tree, &staff);
        let err = SubprocessStateMachine::impact(&sub, &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
    }
}
