//! Backend em memória que aceita toda requisição.
//!
//! Usado pelo comando `demo` e pelos testes quando não há serviço SGC
//! disponível. Registra cada chamada para inspeção posterior.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::adapter::{NOT_STARTED, transition_request};
use super::error::RemoteError;
use super::types::{
    CriarProcessoRequest, HistoricoResponse, IniciarProcessoResponse, ProcessoResponse,
    SubprocessoResumo, UnidadeArvore,
};
use super::{Backend, SubprocessCommand};
use crate::model::{ProcessId, ProcessType, SubprocessId, UnitId};

pub struct OfflineBackend {
    next_id: AtomicU64,
    tree: Vec<UnidadeArvore>,
    calls: Mutex<Vec<String>>,
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::with_tree(Vec::new())
    }
}

impl OfflineBackend {
    pub fn with_tree(tree: Vec<UnidadeArvore>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            tree,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Request paths received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Backend for OfflineBackend {
    async fn create_process(
        &self,
        _req: &CriarProcessoRequest,
    ) -> Result<ProcessoResponse, RemoteError> {
        self.record("POST /api/processos".into());
        Ok(ProcessoResponse {
            codigo: ProcessId(self.next_id()),
            situacao: "CRIADO".into(),
        })
    }

    async fn start_process(
        &self,
        process: ProcessId,
        units: &[UnitId],
    ) -> Result<IniciarProcessoResponse, RemoteError> {
        self.record(format!("POST /api/processos/{process}/iniciar"));
        Ok(IniciarProcessoResponse {
            situacao: "EM_ANDAMENTO".into(),
            subprocessos: units
                .iter()
                .map(|u| SubprocessoResumo {
                    codigo: SubprocessId(self.next_id()),
                    unidade: *u,
                    situacao: NOT_STARTED.into(),
                })
                .collect(),
        })
    }

    async fn finish_process(&self, process: ProcessId) -> Result<(), RemoteError> {
        self.record(format!("POST /api/processos/{process}/finalizar"));
        Ok(())
    }

    async fn transition(
        &self,
        subprocess: SubprocessId,
        command: &SubprocessCommand,
    ) -> Result<(), RemoteError> {
        let (path, _) = transition_request(subprocess, command);
        self.record(format!("POST {path}"));
        Ok(())
    }

    async fn unit_tree(
        &self,
        _process_type: ProcessType,
    ) -> Result<Vec<UnidadeArvore>, RemoteError> {
        self.record("GET /api/unidades/arvore-com-elegibilidade".into());
        Ok(self.tree.clone())
    }

    async fn history(&self, subprocess: SubprocessId) -> Result<HistoricoResponse, RemoteError> {
        self.record(format!("GET /api/subprocessos/{subprocess}/historico"));
        Ok(HistoricoResponse::default())
    }
}
