//! Tipos de domínio compartilhados: identificadores, perfis e o ator da sessão.
//!
//! Os identificadores são newtypes sobre `u64` para que um código de unidade
//! nunca seja confundido com um código de processo ou subprocesso.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Código de uma unidade organizacional.
    UnitId
);
id_type!(
    /// Código de um processo.
    ProcessId
);
id_type!(
    /// Código de um subprocesso (par processo × unidade).
    SubprocessId
);
id_type!(ActivityId);
id_type!(KnowledgeId);
id_type!(CompetencyId);

/// Tipo de processo conduzido pela unidade administradora.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessType {
    Mapping,
    Revision,
    Diagnostic,
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessType::Mapping => write!(f, "MAPPING"),
            ProcessType::Revision => write!(f, "REVISION"),
            ProcessType::Diagnostic => write!(f, "DIAGNOSTIC"),
        }
    }
}

/// Perfis de acesso, do mais amplo ao mais restrito.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Manager,
    UnitHead,
    Staff,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Manager, Role::UnitHead, Role::Staff];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Manager => write!(f, "MANAGER"),
            Role::UnitHead => write!(f, "UNIT_HEAD"),
            Role::Staff => write!(f, "STAFF"),
        }
    }
}

/// Par (perfil, unidade) sob o qual a sessão opera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub role: Role,
    pub unit: UnitId,
}

/// Pessoa autenticada com exatamente um vínculo ativo.
///
/// Uma pessoa pode ter direito a vários vínculos; trocar de vínculo significa
/// construir um novo `Actor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Identificação do usuário (título de eleitor no serviço remoto).
    pub person: String,
    pub binding: RoleBinding,
}

impl Actor {
    pub fn new(person: impl Into<String>, role: Role, unit: UnitId) -> Self {
        Self {
            person: person.into(),
            binding: RoleBinding { role, unit },
        }
    }

    pub fn role(&self) -> Role {
        self.binding.role
    }

    pub fn unit(&self) -> UnitId {
        self.binding.unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&UnitId(42)).unwrap();
        assert_eq!(json, "42");
        let back: SubprocessId = serde_json::from_str("7").unwrap();
        assert_eq!(back, SubprocessId(7));
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::Admin.to_string(), "ADMIN");
        assert_eq!(Role::UnitHead.to_string(), "UNIT_HEAD");
    }

    #[test]
    fn actor_exposes_binding() {
        let actor = Actor::new("123456", Role::Manager, UnitId(3));
        assert_eq!(actor.role(), Role::Manager);
        assert_eq!(actor.unit(), UnitId(3));
    }
}
