//! Formatos de requisição e resposta do serviço SGC.
//!
//! Uma struct por formato, com os nomes de campo em camelCase exatamente como
//! o serviço os serve. Nenhum tipo do núcleo aparece aqui além dos
//! identificadores; a conversão fica em [`super::adapter`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ActivityId, CompetencyId, KnowledgeId, ProcessId, SubprocessId, UnitId};

/// Corpo de `POST /api/processos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriarProcessoRequest {
    pub descricao: String,
    /// `MAPEAMENTO`, `REVISAO` ou `DIAGNOSTICO`.
    pub tipo: String,
    pub data_limite: NaiveDate,
    pub unidades: Vec<UnitId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessoResponse {
    pub codigo: ProcessId,
    pub situacao: String,
}

/// Corpo de `POST /api/processos/{id}/iniciar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IniciarProcessoRequest {
    pub unidades: Vec<UnitId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubprocessoResumo {
    pub codigo: SubprocessId,
    pub unidade: UnitId,
    pub situacao: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IniciarProcessoResponse {
    pub situacao: String,
    pub subprocessos: Vec<SubprocessoResumo>,
}

/// Corpo estruturado das respostas de erro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErroResponse {
    pub codigo: String,
    #[serde(default)]
    pub mensagem: Option<String>,
    #[serde(default)]
    pub unidades: Vec<UnitId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservacoesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observacoes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataLimiteRequest {
    pub data_limite: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SugestoesRequest {
    pub sugestoes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JustificativaRequest {
    pub justificativa: String,
}

/// Corpo de `POST /api/atividades` e `/api/atividades/{codigo}/atualizar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtividadeRequest {
    pub codigo: ActivityId,
    pub descricao: String,
    pub cod_subprocesso: SubprocessId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConhecimentoRequest {
    pub codigo: KnowledgeId,
    pub descricao: String,
}

/// Corpo de `POST /api/subprocessos/{codigo}/competencia[/{competencia}]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetenciaRequest {
    pub codigo: CompetencyId,
    pub descricao: String,
    pub atividades_associadas: Vec<ActivityId>,
}

/// Corpo de uma transição de subprocesso. Serializa apenas o conteúdo da
/// variante; `Vazio` vira `{}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CorpoTransicao {
    Vazio {},
    Observacoes(ObservacoesRequest),
    DataLimite(DataLimiteRequest),
    Sugestoes(SugestoesRequest),
    Justificativa(JustificativaRequest),
    Atividade(AtividadeRequest),
    Conhecimento(ConhecimentoRequest),
    Competencia(CompetenciaRequest),
}

/// Nó de `GET /api/unidades/arvore-com-elegibilidade`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnidadeArvore {
    pub codigo: UnitId,
    pub sigla: String,
    pub nome: String,
    pub elegivel: bool,
    #[serde(default)]
    pub titular: Option<String>,
    #[serde(default)]
    pub filhas: Vec<UnidadeArvore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovimentacaoDto {
    pub data_hora: DateTime<Utc>,
    #[serde(default)]
    pub unidade_origem: Option<UnitId>,
    pub unidade_destino: UnitId,
    pub descricao: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnaliseDto {
    pub data_hora: DateTime<Utc>,
    pub unidade: UnitId,
    pub usuario: String,
    /// `ACEITE` ou `DEVOLUCAO`.
    pub acao: String,
    #[serde(default)]
    pub observacoes: Option<String>,
    /// `CADASTRO` ou `VALIDACAO`.
    pub tipo: String,
}

/// Resposta de `GET /api/subprocessos/{id}/historico`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricoResponse {
    #[serde(default)]
    pub movimentacoes: Vec<MovimentacaoDto>,
    #[serde(default)]
    pub analises: Vec<AnaliseDto>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criar_processo_uses_camel_case() {
        let req = CriarProcessoRequest {
            descricao: "Mapeamento 2026".into(),
            tipo: "MAPEAMENTO".into(),
            data_limite: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            unidades: vec![UnitId(2), UnitId(3)],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["dataLimite"], "2026-12-31");
        assert_eq!(json["unidades"], serde_json::json!([2, 3]));
        assert!(json.get("data_limite").is_none());
    }

    #[test]
    fn corpo_vazio_serializes_as_empty_object() {
        let json = serde_json::to_string(&CorpoTransicao::Vazio {}).unwrap();
        assert_eq!(json, "{}");
        let json = serde_json::to_string(&CorpoTransicao::Observacoes(ObservacoesRequest {
            observacoes: None,
        }))
        .unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn arvore_deserialize_from_api_format() {
        let api_json = r#"[{
            "codigo": 1, "sigla": "SEDOC", "nome": "Secretaria", "elegivel": false,
            "filhas": [
                {"codigo": 2, "sigla": "COSIS", "nome": "Coordenadoria", "elegivel": true,
                 "titular": "Maria"}
            ]
        }]"#;
        let tree: Vec<UnidadeArvore> = serde_json::from_str(api_json).unwrap();
        assert_eq!(tree[0].filhas[0].codigo, UnitId(2));
        assert_eq!(tree[0].filhas[0].titular.as_deref(), Some("Maria"));
        assert!(tree[0].filhas[0].filhas.is_empty());
    }

    #[test]
    fn erro_tolerates_missing_units() {
        let erro: ErroResponse = serde_json::from_str(r#"{"codigo":"ERRO_INTERNO"}"#).unwrap();
        assert!(erro.unidades.is_empty());
        assert_eq!(erro.mensagem, None);
    }
}
