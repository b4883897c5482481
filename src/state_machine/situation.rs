use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::model::ProcessType;

/// Which flavor of process a subprocess belongs to. Both share the same
/// shape; the variant only changes audit labels and a few revision rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    Mapping,
    Revision,
}

impl TryFrom<ProcessType> for Variant {
    type Error = WorkflowError;

    fn try_from(value: ProcessType) -> Result<Self, Self::Error> {
        match value {
            ProcessType::Mapping => Ok(Variant::Mapping),
            ProcessType::Revision => Ok(Variant::Revision),
            ProcessType::Diagnostic => Err(WorkflowError::UnsupportedProcessType(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Track {
    Cadastro,
    Mapa,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Cadastro => write!(f, "CADASTRO"),
            Track::Mapa => write!(f, "MAPA"),
        }
    }
}

/// Activity/knowledge inventory: NOT_STARTED → IN_PROGRESS → MADE_AVAILABLE → HOMOLOGATED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CadastroState {
    NotStarted,
    InProgress,
    MadeAvailable,
    Homologated,
}

/// Competency map: CREATED → MADE_AVAILABLE → {WITH_SUGGESTIONS | VALIDATED} → HOMOLOGATED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapaState {
    Created,
    MadeAvailable,
    WithSuggestions,
    Validated,
    Homologated,
}

/// Current position of a subprocess in its two sequential tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Situation {
    Cadastro(CadastroState),
    Mapa(MapaState),
}

impl Situation {
    pub const INITIAL: Situation = Situation::Cadastro(CadastroState::NotStarted);

    pub const ALL: [Situation; 9] = [
        Situation::Cadastro(CadastroState::NotStarted),
        Situation::Cadastro(CadastroState::InProgress),
        Situation::Cadastro(CadastroState::MadeAvailable),
        Situation::Cadastro(CadastroState::Homologated),
        Situation::Mapa(MapaState::Created),
        Situation::Mapa(MapaState::MadeAvailable),
        Situation::Mapa(MapaState::WithSuggestions),
        Situation::Mapa(MapaState::Validated),
        Situation::Mapa(MapaState::Homologated),
    ];

    pub fn track(self) -> Track {
        match self {
            Situation::Cadastro(_) => Track::Cadastro,
            Situation::Mapa(_) => Track::Mapa,
        }
    }

    /// The state `ProcessStateMachine::finish` waits for.
    pub fn is_terminal(self) -> bool {
        self == Situation::Mapa(MapaState::Homologated)
    }

    /// Audit label, prefixed with the variant so mapping and revision
    /// entries stay distinguishable.
    pub fn label(self, variant: Variant) -> String {
        let prefix = match variant {
            Variant::Mapping => "MAPPING",
            Variant::Revision => "REVISION",
        };
        format!("{prefix}_{self}")
    }
}

impl fmt::Display for Situation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Situation::Cadastro(CadastroState::NotStarted) => "NOT_STARTED",
            Situation::Cadastro(CadastroState::InProgress) => "CADASTRO_IN_PROGRESS",
            Situation::Cadastro(CadastroState::MadeAvailable) => "CADASTRO_MADE_AVAILABLE",
            Situation::Cadastro(CadastroState::Homologated) => "CADASTRO_HOMOLOGATED",
            Situation::Mapa(MapaState::Created) => "MAPA_CREATED",
            Situation::Mapa(MapaState::MadeAvailable) => "MAPA_MADE_AVAILABLE",
            Situation::Mapa(MapaState::WithSuggestions) => "MAPA_WITH_SUGGESTIONS",
            Situation::Mapa(MapaState::Validated) => "MAPA_VALIDATED",
            Situation::Mapa(MapaState::Homologated) => "MAPA_HOMOLOGATED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_homologated_map_is_terminal() {
        let terminal: Vec<_> = Situation::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![Situation::Mapa(MapaState::Homologated)]);
        assert!(!Situation::Cadastro(CadastroState::Homologated).is_terminal());
    }

    #[test]
    fn labels_carry_variant_prefix() {
        let s = Situation::Cadastro(CadastroState::InProgress);
        assert_eq!(s.label(Variant::Mapping), "MAPPING_CADASTRO_IN_PROGRESS");
        assert_eq!(s.label(Variant::Revision), "REVISION_CADASTRO_IN_PROGRESS");
        assert_eq!(Situation::INITIAL.to_string(), "NOT_STARTED");
    }

    #[test]
    fn diagnostic_has_no_variant() {
        assert_eq!(Variant::try_from(ProcessType::Revision).unwrap(), Variant::Revision);
        assert!(matches!(
            Variant::try_from(ProcessType::Diagnostic),
            Err(WorkflowError::UnsupportedProcessType(ProcessType::Diagnostic))
        ));
    }

    #[test]
    fn tracks() {
        assert_eq!(Situation::INITIAL.track(), Track::Cadastro);
        assert_eq!(Situation::Mapa(MapaState::Created).track(), Track::Mapa);
    }
}
