//! Tipos de erro para o cliente do serviço SGC.
//!
//! Define [`RemoteError`] com variantes para respostas de erro da API,
//! pendências estruturadas, códigos desconhecidos e falhas de rede.

use thiserror::Error;

use crate::hierarchy::HierarchyError;
use crate::model::UnitId;

/// Erros que podem ocorrer ao interagir com o serviço SGC.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Resposta HTTP de erro sem corpo estruturado reconhecido.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// HTTP 409 com código `SUBPROCESSOS_PENDENTES`: o processo não pode ser
    /// finalizado enquanto estas unidades não tiverem o mapa homologado.
    #[error("subprocesses still pending for units: {}", join(units))]
    PendingSubprocesses { units: Vec<UnitId> },

    /// Código enviado pelo serviço que não tem correspondente no domínio.
    #[error("unknown {kind} code: {code}")]
    UnknownCode { kind: &'static str, code: String },

    /// Resposta bem-sucedida, mas sem algum dado esperado.
    #[error("incomplete response: {0}")]
    IncompleteResponse(String),

    /// A resposta traz uma situação diferente da que a operação produz.
    #[error("service reported {reported} where {expected} was expected")]
    UnexpectedSituation { expected: String, reported: String },

    /// A árvore de unidades recebida não forma uma hierarquia válida.
    #[error("invalid unit tree: {0}")]
    InvalidTree(#[from] HierarchyError),

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

fn join(units: &[UnitId]) -> String {
    units
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
