//! Núcleo do fluxo de mapeamento de competências do SGC.
//!
//! Processos percorrem uma árvore de unidades; cada unidade participante
//! conduz seu próprio subprocesso (cadastro de atividades, depois mapa de
//! competências) até a homologação. O serviço remoto é a fonte da verdade:
//! [`service::WorkflowService`] só confirma uma transição local depois que o
//! serviço a aceita.

pub mod bulk;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod logging;
pub mod model;
pub mod permission;
pub mod remote;
pub mod service;
pub mod state_machine;
