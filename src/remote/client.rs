use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use super::adapter::{process_type_code, transition_request};
use super::error::RemoteError;
use super::types::{
    CriarProcessoRequest, ErroResponse, HistoricoResponse, IniciarProcessoRequest,
    IniciarProcessoResponse, ProcessoResponse, UnidadeArvore,
};
use super::{Backend, SubprocessCommand};
use crate::config::SgcConfig;
use crate::model::{ProcessId, ProcessType, SubprocessId, UnitId};

const PENDING_CODE: &str = "SUBPROCESSOS_PENDENTES";

pub struct SgcClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl SgcClient {
    pub fn new(config: &SgcConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let token = (!config.api_token.is_empty()).then(|| config.api_token.clone());
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(base_url: &str) -> Result<Self, RemoteError> {
        Self::new(&SgcConfig {
            base_url: base_url.to_string(),
            ..SgcConfig::default()
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request_id = Uuid::new_v4();
        debug!(%method, path, %request_id, "sending request");
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header("x-request-id", request_id.to_string());
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());

        if status == StatusCode::CONFLICT
            && let Ok(erro) = serde_json::from_str::<ErroResponse>(&message)
            && erro.codigo == PENDING_CODE
        {
            return Err(RemoteError::PendingSubprocesses {
                units: erro.unidades,
            });
        }

        Err(RemoteError::ApiError {
            status: status.as_u16(),
            message,
        })
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, RemoteError> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(builder: RequestBuilder) -> Result<(), RemoteError> {
        Self::check(builder.send().await?).await?;
        Ok(())
    }
}

impl Backend for SgcClient {
    async fn create_process(
        &self,
        req: &CriarProcessoRequest,
    ) -> Result<ProcessoResponse, RemoteError> {
        Self::send(self.request(Method::POST, "/api/processos").json(req)).await
    }

    async fn start_process(
        &self,
        process: ProcessId,
        units: &[UnitId],
    ) -> Result<IniciarProcessoResponse, RemoteError> {
        let body = IniciarProcessoRequest {
            unidades: units.to_vec(),
        };
        Self::send(
            self.request(Method::POST, &format!("/api/processos/{process}/iniciar"))
                .json(&body),
        )
        .await
    }

    async fn finish_process(&self, process: ProcessId) -> Result<(), RemoteError> {
        Self::send_empty(self.request(Method::POST, &format!("/api/processos/{process}/finalizar")))
            .await
    }

    async fn transition(
        &self,
        subprocess: SubprocessId,
        command: &SubprocessCommand,
    ) -> Result<(), RemoteError> {
        let (path, body) = transition_request(subprocess, command);
        Self::send_empty(self.request(Method::POST, &path).json(&body)).await
    }

    async fn unit_tree(
        &self,
        process_type: ProcessType,
    ) -> Result<Vec<UnidadeArvore>, RemoteError> {
        Self::send(
            self.request(Method::GET, "/api/unidades/arvore-com-elegibilidade")
                .query(&[("tipoProcesso", process_type_code(process_type))]),
        )
        .await
    }

    async fn history(&self, subprocess: SubprocessId) -> Result<HistoricoResponse, RemoteError> {
        Self::send(self.request(
            Method::GET,
            &format!("/api/subprocessos/{subprocess}/historico"),
        ))
        .await
    }
}
