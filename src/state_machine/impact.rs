//! Diff between the map currently in force and the cadastro under revision.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::subprocess::{Activity, Competency};
use crate::model::{ActivityId, CompetencyId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityChange {
    Inserted {
        id: ActivityId,
        description: String,
    },
    Removed {
        id: ActivityId,
        description: String,
    },
    /// Same activity, new description.
    Altered {
        id: ActivityId,
        before: String,
        after: String,
    },
    /// Same description, different set of knowledge items.
    KnowledgeChanged {
        id: ActivityId,
        description: String,
        before: Vec<String>,
        after: Vec<String>,
    },
}

impl ActivityChange {
    pub fn description(&self) -> &str {
        match self {
            ActivityChange::Inserted { description, .. }
            | ActivityChange::Removed { description, .. }
            | ActivityChange::KnowledgeChanged { description, .. } => description,
            ActivityChange::Altered { after, .. } => after,
        }
    }

    fn detail(&self) -> String {
        match self {
            ActivityChange::Inserted { description, .. } => {
                format!("Atividade inserida: {description}")
            }
            ActivityChange::Removed { description, .. } => {
                format!("Atividade removida: {description}")
            }
            ActivityChange::Altered { before, after, .. } => {
                format!("Atividade alterada: '{before}' → '{after}'")
            }
            ActivityChange::KnowledgeChanged { description, .. } => {
                format!("Conhecimentos alterados: {description}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactedCompetency {
    pub id: CompetencyId,
    pub description: String,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub changes: Vec<ActivityChange>,
    pub impacted: Vec<ImpactedCompetency>,
}

impl ImpactReport {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn inserted(&self) -> impl Iterator<Item = &ActivityChange> {
        self.changes
            .iter()
            .filter(|c| matches!(c, ActivityChange::Inserted { .. }))
    }

    pub fn removed(&self) -> impl Iterator<Item = &ActivityChange> {
        self.changes
            .iter()
            .filter(|c| matches!(c, ActivityChange::Removed { .. }))
    }

    pub fn altered(&self) -> impl Iterator<Item = &ActivityChange> {
        self.changes
            .iter()
            .filter(|c| matches!(c, ActivityChange::Altered { .. }))
    }

    pub fn knowledge_changed(&self) -> impl Iterator<Item = &ActivityChange> {
        self.changes
            .iter()
            .filter(|c| matches!(c, ActivityChange::KnowledgeChanged { .. }))
    }
}

/// Descriptions compare trimmed and case-insensitive.
fn normalized(description: &str) -> String {
    description.trim().to_lowercase()
}

fn knowledge_set(activity: &Activity) -> BTreeSet<&str> {
    activity
        .knowledge
        .iter()
        .map(|k| k.description.as_str())
        .collect()
}

/// Compares the baseline map against the current activities.
///
/// Inserted and removed activities are found by normalized description;
/// altered ones keep their id under a different description. A rename
/// therefore shows up as all three, the way the map review expects it.
/// Inserted activities never impact a competency since none links them yet.
pub fn diff(
    baseline_activities: &[Activity],
    baseline_competencies: &[Competency],
    current: &[Activity],
) -> ImpactReport {
    let baseline_by_desc: HashMap<String, &Activity> = baseline_activities
        .iter()
        .map(|a| (normalized(&a.description), a))
        .collect();
    let current_descs: HashSet<String> =
        current.iter().map(|a| normalized(&a.description)).collect();
    let baseline_by_id: HashMap<ActivityId, &Activity> =
        baseline_activities.iter().map(|a| (a.id, a)).collect();

    let mut changes = Vec::new();
    // (baseline activity id, change index)
    let mut hits: Vec<(ActivityId, usize)> = Vec::new();

    for activity in current {
        match baseline_by_desc.get(&normalized(&activity.description)) {
            None => changes.push(ActivityChange::Inserted {
                id: activity.id,
                description: activity.description.clone(),
            }),
            Some(old) => {
                let before = knowledge_set(old);
                let after = knowledge_set(activity);
                if before != after {
                    hits.push((old.id, changes.len()));
                    changes.push(ActivityChange::KnowledgeChanged {
                        id: old.id,
                        description: activity.description.clone(),
                        before: before.into_iter().map(String::from).collect(),
                        after: after.into_iter().map(String::from).collect(),
                    });
                }
            }
        }
    }

    for old in baseline_activities {
        if !current_descs.contains(&normalized(&old.description)) {
            hits.push((old.id, changes.len()));
            changes.push(ActivityChange::Removed {
                id: old.id,
                description: old.description.clone(),
            });
        }
    }

    for activity in current {
        if let Some(old) = baseline_by_id.get(&activity.id)
            && normalized(&old.description) != normalized(&activity.description)
        {
            hits.push((old.id, changes.len()));
            changes.push(ActivityChange::Altered {
                id: old.id,
                before: old.description.clone(),
                after: activity.description.clone(),
            });
        }
    }

    let impacted = baseline_competencies
        .iter()
        .filter_map(|competency| {
            let mut details: Vec<String> = Vec::new();
            for (_, change) in hits.iter().filter(|(id, _)| competency.activities.contains(id)) {
                let detail = changes[*change].detail();
                if !details.contains(&detail) {
                    details.push(detail);
                }
            }
            (!details.is_empty()).then(|| ImpactedCompetency {
                id: competency.id,
                description: competency.description.clone(),
                details,
            })
        })
        .collect();

    ImpactReport { changes, impacted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KnowledgeId;
    use crate::state_machine::Knowledge;

    fn activity(id: u64, description: &str, knowledge: &[&str]) -> Activity {
        Activity {
            id: ActivityId(id),
            description: description.to_string(),
            knowledge: knowledge
                .iter()
                .enumerate()
                .map(|(i, k)| Knowledge {
                    id: KnowledgeId(id * 100 + i as u64),
                    description: k.to_string(),
                })
                .collect(),
        }
    }

    fn competency(id: u64, description: &str, activities: &[u64]) -> Competency {
        Competency {
            id: CompetencyId(id),
            description: description.to_string(),
            activities: activities.iter().copied().map(ActivityId).collect(),
        }
    }

    #[test]
    fn identical_cadastro_has_no_impact() {
        let baseline = vec![activity(1, "Analisar processos", &["BPMN"])];
        let current = vec![activity(9, "Analisar processos", &["BPMN"])];
        let report = diff(&baseline, &[competency(1, "Modelagem", &[1])], &current);
        assert!(report.is_empty());
        assert!(report.impacted.is_empty());
    }

    #[test]
    fn detects_inserted_removed_and_altered() {
        let baseline = vec![
            activity(1, "Analisar processos", &["BPMN"]),
            activity(2, "Elaborar pareceres", &["Redação"]),
            activity(3, "Atender usuários", &["Comunicação"]),
        ];
        let competencies = vec![
            competency(10, "Modelagem", &[1]),
            competency(11, "Escrita técnica", &[2, 3]),
            competency(12, "Atendimento", &[3]),
        ];
        let current = vec![
            activity(4, "Analisar processos", &["BPMN", "UML"]),
            activity(5, "Atender usuários", &["Comunicação"]),
            activity(6, "Gerir contratos", &["Licitações"]),
        ];

        let report = diff(&baseline, &competencies, &current);

        assert_eq!(report.inserted().count(), 1);
        assert_eq!(report.removed().count(), 1);
        assert_eq!(report.knowledge_changed().count(), 1);
        assert_eq!(report.altered().count(), 0);
        assert_eq!(report.removed().next().unwrap().description(), "Elaborar pareceres");

        let ids: Vec<CompetencyId> = report.impacted.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![CompetencyId(10), CompetencyId(11)]);
        assert_eq!(
            report.impacted[1].details,
            vec!["Atividade removida: Elaborar pareceres".to_string()]
        );
        assert_eq!(
            report.impacted[0].details,
            vec!["Conhecimentos alterados: Analisar processos".to_string()]
        );
    }

    #[test]
    fn rename_is_reported_as_altered() {
        let baseline = vec![activity(1, "Analisar processos", &["BPMN"])];
        let competencies = vec![competency(10, "Modelagem", &[1])];
        let current = vec![activity(1, "Mapear processos", &["BPMN"])];

        let report = diff(&baseline, &competencies, &current);

        assert_eq!(report.altered().count(), 1);
        assert_eq!(report.inserted().count(), 1);
        assert_eq!(report.removed().count(), 1);
        assert_eq!(
            report.altered().next(),
            Some(&ActivityChange::Altered {
                id: ActivityId(1),
                before: "Analisar processos".into(),
                after: "Mapear processos".into(),
            })
        );
        assert_eq!(
            report.impacted[0].details,
            vec![
                "Atividade removida: Analisar processos".to_string(),
                "Atividade alterada: 'Analisar processos' → 'Mapear processos'".to_string(),
            ]
        );
    }

    #[test]
    fn case_and_spacing_are_not_changes() {
        let baseline = vec![activity(1, "Analisar processos", &["BPMN"])];
        let competencies = vec![competency(10, "Modelagem", &[1])];
        let current = vec![activity(1, " analisar PROCESSOS ", &["BPMN"])];

        let report = diff(&baseline, &competencies, &current);
        assert!(report.is_empty());
        assert!(report.impacted.is_empty());
    }

    #[test]
    fn knowledge_order_does_not_count_as_change() {
        let baseline = vec![activity(1, "A", &["x", "y"])];
        let current = vec![activity(1, "A", &["y", "x"])];
        assert!(diff(&baseline, &[], &current).is_empty());
    }
}
