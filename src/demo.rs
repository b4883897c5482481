//! Cenário de demonstração: mapeamento com as unidades X e Y, em memória.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{Duration, Utc};
use console::Style;

use sgc::bulk::BulkAction;
use sgc::hierarchy::{RawUnit, UnitHierarchy, build_tree};
use sgc::model::{ActivityId, Actor, CompetencyId, KnowledgeId, ProcessType, Role, UnitId};
use sgc::remote::OfflineBackend;
use sgc::service::WorkflowService;
use sgc::state_machine::{CadastroEdit, MapEdit, ReviewOutcome, Subprocess};

use crate::ui;

const ROOT: UnitId = UnitId(1);
const X: UnitId = UnitId(10);
const Y: UnitId = UnitId(11);

fn demo_hierarchy() -> Result<UnitHierarchy> {
    let unit = |code: &str, name: &str, parent: Option<UnitId>, eligible: bool| RawUnit {
        code: code.to_string(),
        name: name.to_string(),
        parent,
        steward: None,
        eligible_for: eligible.then_some(ProcessType::Mapping),
    };
    Ok(build_tree(HashMap::from([
        (ROOT, unit("SEDOC", "Secretaria de Documentação", None, false)),
        (X, unit("X", "Seção X", Some(ROOT), true)),
        (Y, unit("Y", "Seção Y", Some(ROOT), true)),
    ]))?)
}

fn heading(text: &str) {
    println!();
    println!("{}", Style::new().bold().apply_to(format!("── {text}")));
}

/// Cadastro, mapa e validação de uma unidade até a homologação.
async fn run_unit(
    service: &WorkflowService<OfflineBackend>,
    sub: &mut Subprocess,
    head: &Actor,
    manager: &Actor,
    admin: &Actor,
) -> Result<()> {
    let code = service
        .hierarchy()
        .get(sub.unit)
        .map(|u| u.code.clone())
        .unwrap_or_default();
    let activity = ActivityId(sub.unit.0 * 100);

    service
        .edit(
            head,
            sub,
            CadastroEdit::AddActivity {
                id: activity,
                description: format!("Atender demandas da seção {code}"),
            },
        )
        .await?;

    // Sem conhecimentos a disponibilização é recusada.
    if let Err(err) = service.make_available_cadastro(head, sub).await {
        println!("  {} {code}: {err}", Style::new().yellow().apply_to("!"));
        ui::print_error_hint(&err);
    }

    service
        .edit(
            head,
            sub,
            CadastroEdit::AddKnowledge {
                activity,
                id: KnowledgeId(activity.0 + 1),
                description: "Legislação aplicável".into(),
            },
        )
        .await?;
    let t = service.make_available_cadastro(head, sub).await?;
    ui::print_transition(&code, sub.variant, &t);

    let t = service
        .review_cadastro(manager, sub, ReviewOutcome::Accepted, Some("De acordo"))
        .await?;
    ui::print_transition(&code, sub.variant, &t);

    let t = service
        .edit_map(
            admin,
            sub,
            MapEdit::AddCompetency {
                id: CompetencyId(activity.0),
                description: "Atendimento normativo".into(),
                activities: vec![activity],
            },
        )
        .await?;
    ui::print_transition(&code, sub.variant, &t);

    let deadline = (Utc::now() + Duration::days(30)).date_naive();
    let t = service.make_available_mapa(admin, sub, deadline).await?;
    ui::print_transition(&code, sub.variant, &t);

    let t = service.validate(head, sub).await?;
    ui::print_transition(&code, sub.variant, &t);

    let t = service
        .review_mapa(manager, sub, ReviewOutcome::Accepted, None)
        .await?;
    ui::print_transition(&code, sub.variant, &t);
    Ok(())
}

pub async fn run() -> Result<()> {
    let service = WorkflowService::new(OfflineBackend::default(), demo_hierarchy()?);
    let admin = Actor::new("admin", Role::Admin, ROOT);
    let manager = Actor::new("gestor", Role::Manager, ROOT);

    heading("Árvore de unidades");
    ui::print_tree(&service.hierarchy(), ProcessType::Mapping);

    heading("Criação e início do processo");
    let deadline = (Utc::now() + Duration::days(60)).date_naive();
    let mut process = service
        .create_process(
            &admin,
            "Mapeamento de competências",
            ProcessType::Mapping,
            deadline,
            &[X, Y],
        )
        .await?;
    let mut subs = service.start_process(&admin, &mut process, &[X, Y]).await?;
    println!(
        "  processo {} {} com {} subprocessos",
        process.id,
        process.situation,
        subs.len()
    );

    heading("Prorrogação de prazo em bloco");
    let extend = BulkAction::ChangeDeadline(deadline + Duration::days(15));
    let offered = service.bulk_candidates(&admin, &extend, &subs).len();
    println!("  {offered} unidades elegíveis");
    let report = service.apply_bulk(&admin, &extend, &mut subs).await;
    ui::print_bulk_report(&report);

    heading("Unidade X");
    let head_x = Actor::new("chefe-x", Role::UnitHead, X);
    if let Some(sub) = subs.iter_mut().find(|s| s.unit == X) {
        run_unit(&service, sub, &head_x, &manager, &admin).await?;
    }

    heading("Tentativa de finalização");
    if let Err(err) = service.finish_process(&admin, &mut process, &subs).await {
        println!("  {} {err}", Style::new().yellow().apply_to("!"));
        ui::print_error_hint(&err);
    }

    heading("Unidade Y");
    let head_y = Actor::new("chefe-y", Role::UnitHead, Y);
    if let Some(sub) = subs.iter_mut().find(|s| s.unit == Y) {
        run_unit(&service, sub, &head_y, &manager, &admin).await?;
    }

    heading("Finalização");
    service.finish_process(&admin, &mut process, &subs).await?;
    println!("  processo {} {}", process.id, process.situation);

    for sub in &subs {
        heading(&format!("Histórico do subprocesso {} ({})", sub.id, sub.label()));
        ui::print_history(&sub.movements, &sub.reviews);
    }
    println!();
    println!("  {} requisições registradas", service.backend().calls().len());
    Ok(())
}
