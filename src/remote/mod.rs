pub mod adapter;
pub mod client;
pub mod error;
pub mod offline;
pub mod types;

pub use client::SgcClient;
pub use error::RemoteError;
pub use offline::OfflineBackend;

use chrono::NaiveDate;

use crate::model::{ProcessId, ProcessType, SubprocessId, UnitId};
use crate::state_machine::{CadastroEdit, MapEdit};
use types::{
    CriarProcessoRequest, HistoricoResponse, IniciarProcessoResponse, ProcessoResponse,
    UnidadeArvore,
};

/// A subprocess transition or edit as sent to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubprocessCommand {
    MakeAvailableCadastro,
    AcceptCadastro { comment: Option<String> },
    ReturnCadastro { reason: String },
    HomologateCadastro { comment: Option<String> },
    ReopenCadastro { justification: String },
    MakeAvailableMapa { deadline: NaiveDate },
    Suggest { text: String },
    Validate,
    AcceptMapa { comment: Option<String> },
    ReturnMapa { reason: String },
    HomologateMapa { comment: Option<String> },
    ChangeDeadline { deadline: NaiveDate },
    EditCadastro(CadastroEdit),
    EditMap(MapEdit),
}

/// The remote SGC service. Implemented over HTTP by [`SgcClient`] and by
/// in-memory doubles in tests.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn create_process(
        &self,
        req: &CriarProcessoRequest,
    ) -> Result<ProcessoResponse, RemoteError>;

    async fn start_process(
        &self,
        process: ProcessId,
        units: &[UnitId],
    ) -> Result<IniciarProcessoResponse, RemoteError>;

    async fn finish_process(&self, process: ProcessId) -> Result<(), RemoteError>;

    async fn transition(
        &self,
        subprocess: SubprocessId,
        command: &SubprocessCommand,
    ) -> Result<(), RemoteError>;

    async fn unit_tree(&self, process_type: ProcessType) -> Result<Vec<UnidadeArvore>, RemoteError>;

    async fn history(&self, subprocess: SubprocessId) -> Result<HistoricoResponse, RemoteError>;
}
