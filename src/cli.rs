//! Interface de linha de comando do `sgc` baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (demo, hierarchy,
//! history) e a flag global `--verbose`.

use clap::{Parser, Subcommand, ValueEnum};

use sgc::model::{ProcessType, SubprocessId};

/// SGC: fluxo de mapeamento de competências por unidade.
#[derive(Debug, Parser)]
#[command(name = "sgc", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Tipo de processo aceito pela CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TipoArg {
    /// Mapeamento inicial de competências.
    Mapping,
    /// Revisão de um mapa vigente.
    Revision,
}

impl From<TipoArg> for ProcessType {
    fn from(arg: TipoArg) -> Self {
        match arg {
            TipoArg::Mapping => ProcessType::Mapping,
            TipoArg::Revision => ProcessType::Revision,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa em memória um mapeamento completo com duas unidades.
    Demo,

    /// Mostra a árvore de unidades com a elegibilidade para o tipo de processo.
    Hierarchy {
        #[arg(long, value_enum, default_value_t = TipoArg::Mapping)]
        tipo: TipoArg,
    },

    /// Mostra movimentações e análises de um subprocesso.
    History {
        /// Código do subprocesso.
        subprocess: u64,
    },
}

impl Command {
    pub fn subprocess(&self) -> Option<SubprocessId> {
        match self {
            Command::History { subprocess } => Some(SubprocessId(*subprocess)),
            _ => None,
        }
    }
}
