//! Configuração do cliente SGC carregada a partir de `sgc.toml`.
//!
//! A struct [`SgcConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `SGC_BASE_URL` e `SGC_API_TOKEN` têm precedência
//! sobre o arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE: &str = "sgc.toml";

/// Configuração de nível superior carregada de `sgc.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SgcConfig {
    /// Endereço base do serviço SGC, sem barra final.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Token de acesso enviado como `Bearer`. Vazio desativa o cabeçalho.
    #[serde(default)]
    pub api_token: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Filtro de log no formato do `EnvFilter` (ex.: `sgc=debug`).
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_base_url() -> String {
    "http://localhost:10000".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for SgcConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: String::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            log_filter: default_log_filter(),
        }
    }
}

impl SgcConfig {
    /// Carrega a configuração de `sgc.toml` no diretório atual.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega de `path`, usando valores padrão se o arquivo não existir, e
    /// aplica as variáveis de ambiente por cima.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str::<SgcConfig>(&contents)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(url) = std::env::var("SGC_BASE_URL")
            && !url.is_empty()
        {
            config.base_url = url;
        }
        if let Ok(token) = std::env::var("SGC_API_TOKEN")
            && !token.is_empty()
        {
            config.api_token = token;
        }

        Ok(config)
    }
}
