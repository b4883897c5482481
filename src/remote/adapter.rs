//! Conversão entre os formatos do serviço e os tipos do núcleo.
//!
//! Todo nome de campo e código em português termina aqui.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::hierarchy::{HierarchyError, RawUnit, UnitHierarchy, build_tree};
use crate::model::{ActivityId, CompetencyId, ProcessType, SubprocessId, UnitId};
use crate::state_machine::{
    CadastroEdit, CadastroState as C, MapEdit, MapaState as M, Movement, ProcessSituation,
    ReviewOutcome, ReviewRecord, Situation, Track, Variant,
};

use super::RemoteError;
use super::SubprocessCommand;
use super::types::{
    AtividadeRequest, CompetenciaRequest, ConhecimentoRequest, CorpoTransicao, DataLimiteRequest,
    HistoricoResponse, JustificativaRequest, ObservacoesRequest, SugestoesRequest, UnidadeArvore,
};

pub fn process_type_code(process_type: ProcessType) -> &'static str {
    match process_type {
        ProcessType::Mapping => "MAPEAMENTO",
        ProcessType::Revision => "REVISAO",
        ProcessType::Diagnostic => "DIAGNOSTICO",
    }
}

pub fn parse_process_situation(code: &str) -> Result<ProcessSituation, RemoteError> {
    match code {
        "CRIADO" => Ok(ProcessSituation::Created),
        "EM_ANDAMENTO" => Ok(ProcessSituation::InProgress),
        "FINALIZADO" => Ok(ProcessSituation::Finished),
        other => Err(unknown("process situation", other)),
    }
}

/// Checks that the service reports the situation the local transition produced.
pub fn expect_process_situation(
    code: &str,
    expected: ProcessSituation,
) -> Result<(), RemoteError> {
    let reported = parse_process_situation(code)?;
    if reported != expected {
        return Err(RemoteError::UnexpectedSituation {
            expected: expected.to_string(),
            reported: reported.to_string(),
        });
    }
    Ok(())
}

fn unknown(kind: &'static str, code: &str) -> RemoteError {
    RemoteError::UnknownCode {
        kind,
        code: code.to_string(),
    }
}

// Revision spells a few states in the feminine, and calls the created map "adjusted".
#[rustfmt::skip]
const SITUATION_CODES: &[(Variant, Situation, &str)] = &[
    (Variant::Mapping, Situation::Cadastro(C::InProgress), "MAPEAMENTO_CADASTRO_EM_ANDAMENTO"),
    (Variant::Mapping, Situation::Cadastro(C::MadeAvailable), "MAPEAMENTO_CADASTRO_DISPONIBILIZADO"),
    (Variant::Mapping, Situation::Cadastro(C::Homologated), "MAPEAMENTO_CADASTRO_HOMOLOGADO"),
    (Variant::Mapping, Situation::Mapa(M::Created), "MAPEAMENTO_MAPA_CRIADO"),
    (Variant::Mapping, Situation::Mapa(M::MadeAvailable), "MAPEAMENTO_MAPA_DISPONIBILIZADO"),
    (Variant::Mapping, Situation::Mapa(M::WithSuggestions), "MAPEAMENTO_MAPA_COM_SUGESTOES"),
    (Variant::Mapping, Situation::Mapa(M::Validated), "MAPEAMENTO_MAPA_VALIDADO"),
    (Variant::Mapping, Situation::Mapa(M::Homologated), "MAPEAMENTO_MAPA_HOMOLOGADO"),
    (Variant::Revision, Situation::Cadastro(C::InProgress), "REVISAO_CADASTRO_EM_ANDAMENTO"),
    (Variant::Revision, Situation::Cadastro(C::MadeAvailable), "REVISAO_CADASTRO_DISPONIBILIZADA"),
    (Variant::Revision, Situation::Cadastro(C::Homologated), "REVISAO_CADASTRO_HOMOLOGADA"),
    (Variant::Revision, Situation::Mapa(M::Created), "REVISAO_MAPA_AJUSTADO"),
    (Variant::Revision, Situation::Mapa(M::MadeAvailable), "REVISAO_MAPA_DISPONIBILIZADO"),
    (Variant::Revision, Situation::Mapa(M::WithSuggestions), "REVISAO_MAPA_COM_SUGESTOES"),
    (Variant::Revision, Situation::Mapa(M::Validated), "REVISAO_MAPA_VALIDADO"),
    (Variant::Revision, Situation::Mapa(M::Homologated), "REVISAO_MAPA_HOMOLOGADO"),
];

pub const NOT_STARTED: &str = "NAO_INICIADO";

/// Decodes a subprocess situation. `NAO_INICIADO` carries no variant.
pub fn parse_situation(code: &str) -> Result<(Option<Variant>, Situation), RemoteError> {
    if code == NOT_STARTED {
        return Ok((None, Situation::INITIAL));
    }
    SITUATION_CODES
        .iter()
        .find(|(_, _, c)| *c == code)
        .map(|(v, s, _)| (Some(*v), *s))
        .ok_or_else(|| unknown("situation", code))
}

/// Path and body of the request carrying `command` for `subprocess`.
///
/// Transitions live under `/api/subprocessos/{codigo}`; activity and
/// knowledge edits go to `/api/atividades`.
pub fn transition_request(
    subprocess: SubprocessId,
    command: &SubprocessCommand,
) -> (String, CorpoTransicao) {
    fn observacoes(comment: &Option<String>) -> CorpoTransicao {
        CorpoTransicao::Observacoes(ObservacoesRequest {
            observacoes: comment.clone(),
        })
    }
    fn data_limite(deadline: NaiveDate) -> CorpoTransicao {
        CorpoTransicao::DataLimite(DataLimiteRequest {
            data_limite: deadline,
        })
    }
    let on_subprocess = |segment: &str| format!("/api/subprocessos/{subprocess}/{segment}");

    match command {
        SubprocessCommand::MakeAvailableCadastro => {
            (on_subprocess("disponibilizar-cadastro"), CorpoTransicao::Vazio {})
        }
        SubprocessCommand::AcceptCadastro { comment } => {
            (on_subprocess("aceitar-cadastro"), observacoes(comment))
        }
        SubprocessCommand::ReturnCadastro { reason } => (
            on_subprocess("devolver-cadastro"),
            observacoes(&Some(reason.clone())),
        ),
        SubprocessCommand::HomologateCadastro { comment } => {
            (on_subprocess("homologar-cadastro"), observacoes(comment))
        }
        SubprocessCommand::ReopenCadastro { justification } => (
            on_subprocess("reabrir-cadastro"),
            CorpoTransicao::Justificativa(JustificativaRequest {
                justificativa: justification.clone(),
            }),
        ),
        SubprocessCommand::MakeAvailableMapa { deadline } => {
            (on_subprocess("disponibilizar-mapa"), data_limite(*deadline))
        }
        SubprocessCommand::Suggest { text } => (
            on_subprocess("apresentar-sugestoes"),
            CorpoTransicao::Sugestoes(SugestoesRequest {
                sugestoes: text.clone(),
            }),
        ),
        SubprocessCommand::Validate => (on_subprocess("validar-mapa"), CorpoTransicao::Vazio {}),
        SubprocessCommand::AcceptMapa { comment } => {
            (on_subprocess("aceitar-validacao"), observacoes(comment))
        }
        SubprocessCommand::ReturnMapa { reason } => (
            on_subprocess("devolver-validacao"),
            observacoes(&Some(reason.clone())),
        ),
        SubprocessCommand::HomologateMapa { comment } => {
            (on_subprocess("homologar-validacao"), observacoes(comment))
        }
        SubprocessCommand::ChangeDeadline { deadline } => {
            (on_subprocess("data-limite"), data_limite(*deadline))
        }
        SubprocessCommand::EditCadastro(edit) => cadastro_edit_request(subprocess, edit),
        SubprocessCommand::EditMap(edit) => map_edit_request(subprocess, edit),
    }
}

fn cadastro_edit_request(
    subprocess: SubprocessId,
    edit: &CadastroEdit,
) -> (String, CorpoTransicao) {
    let atividade = |codigo: ActivityId, descricao: &str| {
        CorpoTransicao::Atividade(AtividadeRequest {
            codigo,
            descricao: descricao.trim().to_string(),
            cod_subprocesso: subprocess,
        })
    };
    match edit {
        CadastroEdit::AddActivity { id, description } => {
            ("/api/atividades".to_string(), atividade(*id, description))
        }
        CadastroEdit::RenameActivity { id, description } => (
            format!("/api/atividades/{id}/atualizar"),
            atividade(*id, description),
        ),
        CadastroEdit::RemoveActivity(id) => {
            (format!("/api/atividades/{id}/excluir"), CorpoTransicao::Vazio {})
        }
        CadastroEdit::AddKnowledge {
            activity,
            id,
            description,
        } => (
            format!("/api/atividades/{activity}/conhecimentos"),
            CorpoTransicao::Conhecimento(ConhecimentoRequest {
                codigo: *id,
                descricao: description.trim().to_string(),
            }),
        ),
        CadastroEdit::RemoveKnowledge { activity, id } => (
            format!("/api/atividades/{activity}/conhecimentos/{id}/excluir"),
            CorpoTransicao::Vazio {},
        ),
    }
}

fn map_edit_request(subprocess: SubprocessId, edit: &MapEdit) -> (String, CorpoTransicao) {
    let path = format!("/api/subprocessos/{subprocess}/competencia");
    let competencia = |codigo: CompetencyId, descricao: &str, atividades: &[ActivityId]| {
        CorpoTransicao::Competencia(CompetenciaRequest {
            codigo,
            descricao: descricao.trim().to_string(),
            atividades_associadas: atividades.to_vec(),
        })
    };
    match edit {
        MapEdit::AddCompetency {
            id,
            description,
            activities,
        } => (path, competencia(*id, description, activities)),
        MapEdit::UpdateCompetency {
            id,
            description,
            activities,
        } => (
            format!("{path}/{id}"),
            competencia(*id, description, activities),
        ),
        MapEdit::RemoveCompetency(id) => (format!("{path}/{id}/remover"), CorpoTransicao::Vazio {}),
    }
}

/// Flattens the nested eligibility tree into raw units. The eligibility flag
/// is attached to the process type the tree was requested for. A unit listed
/// under two parents is rejected.
pub fn flatten_tree(
    roots: &[UnidadeArvore],
    process_type: ProcessType,
) -> Result<HashMap<UnitId, RawUnit>, HierarchyError> {
    let mut units = HashMap::new();
    let mut stack: Vec<(&UnidadeArvore, Option<UnitId>)> =
        roots.iter().map(|r| (r, None)).collect();

    while let Some((node, parent)) = stack.pop() {
        let raw = RawUnit {
            code: node.sigla.clone(),
            name: node.nome.clone(),
            parent,
            steward: node.titular.clone(),
            eligible_for: node.elegivel.then_some(process_type),
        };
        if units.insert(node.codigo, raw).is_some() {
            return Err(HierarchyError::DuplicateUnit { unit: node.codigo });
        }
        stack.extend(node.filhas.iter().map(|c| (c, Some(node.codigo))));
    }
    Ok(units)
}

pub fn hierarchy_from_tree(
    roots: &[UnidadeArvore],
    process_type: ProcessType,
) -> Result<UnitHierarchy, RemoteError> {
    Ok(build_tree(flatten_tree(roots, process_type)?)?)
}

pub fn history_from(
    dto: HistoricoResponse,
) -> Result<(Vec<Movement>, Vec<ReviewRecord>), RemoteError> {
    let movements = dto
        .movimentacoes
        .into_iter()
        .map(|m| Movement {
            at: m.data_hora,
            from: m.unidade_origem,
            to: m.unidade_destino,
            description: m.descricao,
        })
        .collect();

    let reviews = dto
        .analises
        .into_iter()
        .map(|a| {
            let outcome = match a.acao.as_str() {
                "ACEITE" => ReviewOutcome::Accepted,
                "DEVOLUCAO" => ReviewOutcome::ReturnedForAdjustment,
                other => return Err(unknown("review outcome", other)),
            };
            let track = match a.tipo.as_str() {
                "CADASTRO" => Track::Cadastro,
                "VALIDACAO" => Track::Mapa,
                other => return Err(unknown("review track", other)),
            };
            Ok(ReviewRecord {
                at: a.data_hora,
                unit: a.unidade,
                reviewer: a.usuario,
                outcome,
                comment: a.observacoes,
                track,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((movements, reviews))
}
