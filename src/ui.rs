//! Saída de terminal do `sgc`: spinner durante requisições e listagens coloridas.
//!
//! Usa `indicatif` para o spinner e `console` para os estilos. As funções
//! `render_*` montam as linhas sem imprimir, para que possam ser testadas.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use sgc::bulk::{BulkOutcome, BulkReport};
use sgc::error::{ErrorKind, WorkflowError};
use sgc::hierarchy::UnitHierarchy;
use sgc::model::ProcessType;
use sgc::state_machine::{Movement, ReviewOutcome, ReviewRecord, Transition, Variant};

/// Spinner shown while a request to the service is outstanding.
pub struct RequestProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
}

impl RequestProgress {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    pub fn success(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", self.green.apply_to("✓"));
    }

    pub fn failure(&self, err: &WorkflowError) {
        self.pb.finish_and_clear();
        println!("  {} {err}", self.red.apply_to("✗"));
        print_error_hint(err);
    }
}

/// One line per unit, indented by depth, with its eligibility marker.
pub fn render_tree(hierarchy: &UnitHierarchy, process_type: ProcessType) -> Vec<String> {
    hierarchy
        .units()
        .map(|unit| {
            let depth = hierarchy.ancestors(unit.id).count();
            let marker = if hierarchy.is_eligible(unit.id, process_type) {
                "[x]"
            } else {
                "[ ]"
            };
            let steward = unit
                .steward
                .as_deref()
                .map(|s| format!(" ({s})"))
                .unwrap_or_default();
            format!(
                "{}{marker} {} - {}{steward}",
                "  ".repeat(depth),
                unit.code,
                unit.name
            )
        })
        .collect()
}

pub fn print_tree(hierarchy: &UnitHierarchy, process_type: ProcessType) {
    let dim = Style::new().dim();
    let green = Style::new().green();
    println!(
        "{}",
        Style::new()
            .bold()
            .apply_to(format!("─── Unidades elegíveis para {process_type} ───"))
    );
    for line in render_tree(hierarchy, process_type) {
        if line.contains("[x]") {
            println!("{}", green.apply_to(line));
        } else {
            println!("{}", dim.apply_to(line));
        }
    }
}

pub fn render_bulk_report(report: &BulkReport) -> Vec<String> {
    report
        .results
        .iter()
        .map(|r| match &r.outcome {
            BulkOutcome::Applied { situation } => {
                format!("✓ unidade {} → {situation}", r.unit)
            }
            BulkOutcome::Skipped { reason } => {
                format!("✗ unidade {}: {reason}", r.unit)
            }
        })
        .collect()
}

pub fn print_bulk_report(report: &BulkReport) {
    let green = Style::new().green();
    let yellow = Style::new().yellow();
    for (line, result) in render_bulk_report(report).into_iter().zip(&report.results) {
        match result.outcome {
            BulkOutcome::Applied { .. } => println!("  {}", green.apply_to(line)),
            BulkOutcome::Skipped { .. } => println!("  {}", yellow.apply_to(line)),
        }
    }
}

/// Movements and reviews merged in chronological order.
pub fn render_history(movements: &[Movement], reviews: &[ReviewRecord]) -> Vec<String> {
    let mut lines: Vec<(chrono::DateTime<chrono::Utc>, String)> = movements
        .iter()
        .map(|m| {
            let from = m.from.map(|u| u.to_string()).unwrap_or_else(|| "-".into());
            (
                m.at,
                format!("{} {from} → {}: {}", m.at.format("%d/%m/%Y %H:%M"), m.to, m.description),
            )
        })
        .collect();
    lines.extend(reviews.iter().map(|r| {
        let outcome = match r.outcome {
            ReviewOutcome::Accepted => "aceite",
            ReviewOutcome::ReturnedForAdjustment => "devolução",
        };
        let comment = r
            .comment
            .as_deref()
            .map(|c| format!(" \"{c}\""))
            .unwrap_or_default();
        (
            r.at,
            format!(
                "{} análise {} de {} por {} (unidade {}){comment}",
                r.at.format("%d/%m/%Y %H:%M"),
                r.track,
                outcome,
                r.reviewer,
                r.unit
            ),
        )
    }));
    lines.sort_by_key(|(at, _)| *at);
    lines.into_iter().map(|(_, line)| line).collect()
}

pub fn print_history(movements: &[Movement], reviews: &[ReviewRecord]) {
    let lines = render_history(movements, reviews);
    if lines.is_empty() {
        println!("  {}", Style::new().dim().apply_to("sem registros"));
        return;
    }
    for line in lines {
        println!("  {line}");
    }
}

pub fn print_transition(unit: &str, variant: Variant, transition: &Transition) {
    println!(
        "  {} {unit}: {} → {}",
        Style::new().cyan().apply_to("→"),
        transition.from.label(variant),
        Style::new().bold().apply_to(transition.to.label(variant))
    );
}

/// Recovery hint for the user, by error kind.
pub fn error_hint(err: &WorkflowError) -> &'static str {
    match err.kind() {
        ErrorKind::Validation => "corrija os dados informados e tente novamente",
        ErrorKind::Permission => "o perfil ativo não permite esta ação",
        ErrorKind::Precondition => "ajuste os itens apontados e tente novamente",
        ErrorKind::Transport => "o serviço não confirmou; o estado local não mudou",
    }
}

pub fn print_error_hint(err: &WorkflowError) {
    let style = match err.kind() {
        ErrorKind::Permission => Style::new().red(),
        ErrorKind::Transport => Style::new().yellow(),
        _ => Style::new().dim(),
    };
    println!("    {}", style.apply_to(error_hint(err)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sgc::bulk::UnitResult;
    use sgc::hierarchy::{RawUnit, build_tree};
    use sgc::model::{SubprocessId, UnitId};
    use sgc::state_machine::{CadastroState, Situation, Track};
    use std::collections::HashMap;

    fn unit(code: &str, parent: Option<u64>, eligible: bool) -> RawUnit {
        RawUnit {
            code: code.to_string(),
            name: format!("Unidade {code}"),
            parent: parent.map(UnitId),
            steward: None,
            eligible_for: eligible.then_some(ProcessType::Mapping),
        }
    }

    #[test]
    fn tree_lines_are_indented_and_marked() {
        let hierarchy = build_tree(HashMap::from([
            (UnitId(1), unit("RAIZ", None, false)),
            (UnitId(2), unit("X", Some(1), true)),
        ]))
        .unwrap();
        let lines = render_tree(&hierarchy, ProcessType::Mapping);
        assert_eq!(lines, vec!["[ ] RAIZ - Unidade RAIZ", "  [x] X - Unidade X"]);
    }

    #[test]
    fn bulk_report_lists_each_unit() {
        let report = BulkReport {
            results: vec![
                UnitResult {
                    subprocess: SubprocessId(1),
                    unit: UnitId(10),
                    outcome: BulkOutcome::Applied {
                        situation: Situation::Cadastro(CadastroState::Homologated),
                    },
                },
                UnitResult {
                    subprocess: SubprocessId(2),
                    unit: UnitId(11),
                    outcome: BulkOutcome::Skipped {
                        reason: WorkflowError::NoActivities,
                    },
                },
            ],
        };
        let lines = render_bulk_report(&report);
        assert_eq!(lines[0], "✓ unidade 10 → CADASTRO_HOMOLOGATED");
        assert_eq!(lines[1], "✗ unidade 11: cadastro has no activities");
    }

    #[test]
    fn history_is_chronological() {
        let early = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let movements = vec![Movement {
            at: late,
            from: Some(UnitId(1)),
            to: UnitId(10),
            description: "Cadastro devolvido".into(),
        }];
        let reviews = vec![ReviewRecord {
            at: early,
            unit: UnitId(1),
            reviewer: "gestor".into(),
            outcome: ReviewOutcome::ReturnedForAdjustment,
            comment: Some("faltam conhecimentos".into()),
            track: Track::Cadastro,
        }];
        let lines = render_history(&movements, &reviews);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("devolução por gestor"));
        assert!(lines[1].ends_with("1 → 10: Cadastro devolvido"));
    }

    #[test]
    fn hints_follow_error_kind() {
        assert_eq!(
            error_hint(&WorkflowError::EmptySelection),
            "corrija os dados informados e tente novamente"
        );
        assert!(error_hint(&WorkflowError::NoActivities).contains("ajuste"));
    }
}
