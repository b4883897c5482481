//! Derivação de permissões: uma única função pura de
//! (perfil, posição na hierarquia, situação) para um conjunto de capacidades.
//!
//! Toda regra de acesso vive na tabela [`RULES`]. Operações unitárias e em
//! bloco consultam a mesma função, de modo que uma ação em bloco nunca é
//! oferecida para uma unidade onde a ação unitária seria negada.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hierarchy::UnitPosition;
use crate::model::Role;
use crate::state_machine::Situation::{Cadastro, Mapa};
use crate::state_machine::{CadastroState as C, MapaState as M, ProcessSituation, Situation};

/// Every guarded workflow intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Start,
    Finish,
    EditCadastro,
    MakeAvailableCadastro,
    AcceptCadastro,
    ReturnCadastro,
    HomologateCadastro,
    ReopenCadastro,
    EditMap,
    MakeAvailableMapa,
    Suggest,
    Validate,
    AcceptMapa,
    ReturnMapa,
    HomologateMapa,
    ChangeDeadline,
    ViewImpact,
}

impl Action {
    pub const ALL: [Action; 17] = [
        Action::Start,
        Action::Finish,
        Action::EditCadastro,
        Action::MakeAvailableCadastro,
        Action::AcceptCadastro,
        Action::ReturnCadastro,
        Action::HomologateCadastro,
        Action::ReopenCadastro,
        Action::EditMap,
        Action::MakeAvailableMapa,
        Action::Suggest,
        Action::Validate,
        Action::AcceptMapa,
        Action::ReturnMapa,
        Action::HomologateMapa,
        Action::ChangeDeadline,
        Action::ViewImpact,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Start => "start process",
            Action::Finish => "finish process",
            Action::EditCadastro => "edit cadastro",
            Action::MakeAvailableCadastro => "make cadastro available",
            Action::AcceptCadastro => "accept cadastro",
            Action::ReturnCadastro => "return cadastro",
            Action::HomologateCadastro => "homologate cadastro",
            Action::ReopenCadastro => "reopen cadastro",
            Action::EditMap => "edit map",
            Action::MakeAvailableMapa => "make map available",
            Action::Suggest => "suggest map changes",
            Action::Validate => "validate map",
            Action::AcceptMapa => "accept map",
            Action::ReturnMapa => "return map",
            Action::HomologateMapa => "homologate map",
            Action::ChangeDeadline => "change deadline",
            Action::ViewImpact => "view map impact",
        };
        f.write_str(name)
    }
}

/// Situation a guard is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardSituation {
    Process(ProcessSituation),
    Subprocess(Situation),
}

impl fmt::Display for GuardSituation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardSituation::Process(s) => write!(f, "process {s}"),
            GuardSituation::Subprocess(s) => write!(f, "{s}"),
        }
    }
}

/// Record of booleans, one per guarded action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub can_start: bool,
    pub can_finish: bool,
    pub can_edit_cadastro: bool,
    pub can_make_available_cadastro: bool,
    pub can_accept_cadastro: bool,
    pub can_return_cadastro: bool,
    pub can_homologate_cadastro: bool,
    pub can_reopen_cadastro: bool,
    pub can_edit_map: bool,
    pub can_make_available_mapa: bool,
    pub can_suggest: bool,
    pub can_validate: bool,
    pub can_accept_mapa: bool,
    pub can_return_mapa: bool,
    pub can_homologate_mapa: bool,
    pub can_change_deadline: bool,
    pub can_view_impact: bool,
}

impl CapabilitySet {
    pub fn allows(&self, action: Action) -> bool {
        *self.flag(action)
    }

    fn flag(&self, action: Action) -> &bool {
        match action {
            Action::Start => &self.can_start,
            Action::Finish => &self.can_finish,
            Action::EditCadastro => &self.can_edit_cadastro,
            Action::MakeAvailableCadastro => &self.can_make_available_cadastro,
            Action::AcceptCadastro => &self.can_accept_cadastro,
            Action::ReturnCadastro => &self.can_return_cadastro,
            Action::HomologateCadastro => &self.can_homologate_cadastro,
            Action::ReopenCadastro => &self.can_reopen_cadastro,
            Action::EditMap => &self.can_edit_map,
            Action::MakeAvailableMapa => &self.can_make_available_mapa,
            Action::Suggest => &self.can_suggest,
            Action::Validate => &self.can_validate,
            Action::AcceptMapa => &self.can_accept_mapa,
            Action::ReturnMapa => &self.can_return_mapa,
            Action::HomologateMapa => &self.can_homologate_mapa,
            Action::ChangeDeadline => &self.can_change_deadline,
            Action::ViewImpact => &self.can_view_impact,
        }
    }

    fn set(&mut self, action: Action) {
        let flag = match action {
            Action::Start => &mut self.can_start,
            Action::Finish => &mut self.can_finish,
            Action::EditCadastro => &mut self.can_edit_cadastro,
            Action::MakeAvailableCadastro => &mut self.can_make_available_cadastro,
            Action::AcceptCadastro => &mut self.can_accept_cadastro,
            Action::ReturnCadastro => &mut self.can_return_cadastro,
            Action::HomologateCadastro => &mut self.can_homologate_cadastro,
            Action::ReopenCadastro => &mut self.can_reopen_cadastro,
            Action::EditMap => &mut self.can_edit_map,
            Action::MakeAvailableMapa => &mut self.can_make_available_mapa,
            Action::Suggest => &mut self.can_suggest,
            Action::Validate => &mut self.can_validate,
            Action::AcceptMapa => &mut self.can_accept_mapa,
            Action::ReturnMapa => &mut self.can_return_mapa,
            Action::HomologateMapa => &mut self.can_homologate_mapa,
            Action::ChangeDeadline => &mut self.can_change_deadline,
            Action::ViewImpact => &mut self.can_view_impact,
        };
        *flag = true;
    }

    pub fn is_empty(&self) -> bool {
        Action::ALL.iter().all(|a| !self.allows(*a))
    }

    pub fn is_superset_of(&self, other: &CapabilitySet) -> bool {
        Action::ALL
            .iter()
            .all(|a| !other.allows(*a) || self.allows(*a))
    }

    /// Actions currently allowed, in declaration order.
    pub fn allowed(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.into_iter().filter(|a| self.allows(*a))
    }
}

// Ordered from least to most privileged.
fn rank(role: Role) -> u8 {
    match role {
        Role::Staff => 0,
        Role::UnitHead => 1,
        Role::Manager => 2,
        Role::Admin => 3,
    }
}

/// Hierarchy requirement of a rule. ADMIN is global and satisfies all three.
#[derive(Debug, Clone, Copy)]
enum Scope {
    Global,
    OwnUnit,
    AtOrAbove,
}

struct Rule {
    action: Action,
    min_role: Role,
    scope: Scope,
    situations: fn(GuardSituation) -> bool,
}

fn subprocess_in(situation: GuardSituation, allowed: &[Situation]) -> bool {
    matches!(situation, GuardSituation::Subprocess(s) if allowed.contains(&s))
}

const RULES: &[Rule] = &[
    Rule {
        action: Action::Start,
        min_role: Role::Admin,
        scope: Scope::Global,
        situations: |s| s == GuardSituation::Process(ProcessSituation::Created),
    },
    Rule {
        action: Action::Finish,
        min_role: Role::Admin,
        scope: Scope::Global,
        situations: |s| s == GuardSituation::Process(ProcessSituation::InProgress),
    },
    Rule {
        action: Action::EditCadastro,
        min_role: Role::Staff,
        scope: Scope::OwnUnit,
        situations: |s| subprocess_in(s, &[Cadastro(C::NotStarted), Cadastro(C::InProgress)]),
    },
    Rule {
        action: Action::MakeAvailableCadastro,
        min_role: Role::UnitHead,
        scope: Scope::OwnUnit,
        situations: |s| subprocess_in(s, &[Cadastro(C::InProgress)]),
    },
    Rule {
        action: Action::AcceptCadastro,
        min_role: Role::Manager,
        scope: Scope::AtOrAbove,
        situations: |s| subprocess_in(s, &[Cadastro(C::MadeAvailable)]),
    },
    Rule {
        action: Action::ReturnCadastro,
        min_role: Role::Manager,
        scope: Scope::AtOrAbove,
        situations: |s| subprocess_in(s, &[Cadastro(C::MadeAvailable)]),
    },
    Rule {
        action: Action::HomologateCadastro,
        min_role: Role::Admin,
        scope: Scope::Global,
        situations: |s| subprocess_in(s, &[Cadastro(C::MadeAvailable)]),
    },
    Rule {
        action: Action::ReopenCadastro,
        min_role: Role::Admin,
        scope: Scope::Global,
        situations: |s| {
            subprocess_in(
                s,
                &[
                    Cadastro(C::MadeAvailable),
                    Cadastro(C::Homologated),
                    Mapa(M::Created),
                    Mapa(M::MadeAvailable),
                    Mapa(M::WithSuggestions),
                    Mapa(M::Validated),
                ],
            )
        },
    },
    Rule {
        action: Action::EditMap,
        min_role: Role::Admin,
        scope: Scope::Global,
        situations: |s| {
            subprocess_in(
                s,
                &[Cadastro(C::Homologated), Mapa(M::Created), Mapa(M::WithSuggestions)],
            )
        },
    },
    Rule {
        action: Action::MakeAvailableMapa,
        min_role: Role::Admin,
        scope: Scope::Global,
        situations: |s| subprocess_in(s, &[Mapa(M::Created), Mapa(M::WithSuggestions)]),
    },
    Rule {
        action: Action::Suggest,
        min_role: Role::UnitHead,
        scope: Scope::OwnUnit,
        situations: |s| subprocess_in(s, &[Mapa(M::MadeAvailable)]),
    },
    Rule {
        action: Action::Validate,
        min_role: Role::UnitHead,
        scope: Scope::OwnUnit,
        situations: |s| subprocess_in(s, &[Mapa(M::MadeAvailable), Mapa(M::WithSuggestions)]),
    },
    Rule {
        action: Action::AcceptMapa,
        min_role: Role::Manager,
        scope: Scope::AtOrAbove,
        situations: |s| subprocess_in(s, &[Mapa(M::Validated)]),
    },
    Rule {
        action: Action::ReturnMapa,
        min_role: Role::Manager,
        scope: Scope::AtOrAbove,
        situations: |s| subprocess_in(s, &[Mapa(M::Validated)]),
    },
    Rule {
        action: Action::HomologateMapa,
        min_role: Role::Admin,
        scope: Scope::Global,
        situations: |s| subprocess_in(s, &[Mapa(M::Validated)]),
    },
    Rule {
        action: Action::ChangeDeadline,
        min_role: Role::Admin,
        scope: Scope::Global,
        situations: |s| matches!(s, GuardSituation::Subprocess(sub) if !sub.is_terminal()),
    },
    Rule {
        action: Action::ViewImpact,
        min_role: Role::UnitHead,
        scope: Scope::AtOrAbove,
        situations: |s| {
            subprocess_in(
                s,
                &[
                    Cadastro(C::InProgress),
                    Cadastro(C::MadeAvailable),
                    Cadastro(C::Homologated),
                    Mapa(M::Created),
                ],
            )
        },
    },
];

fn in_scope(role: Role, position: UnitPosition, scope: Scope) -> bool {
    if role == Role::Admin {
        return true;
    }
    match scope {
        Scope::Global => true,
        Scope::OwnUnit => position == UnitPosition::Own,
        Scope::AtOrAbove => position.at_or_above(),
    }
}

/// Capabilities of `role` acting from `position` on something in `situation`.
///
/// Total: combinations no rule covers yield the empty set.
pub fn capabilities(
    role: Role,
    position: UnitPosition,
    situation: GuardSituation,
) -> CapabilitySet {
    let mut caps = CapabilitySet::default();
    for rule in RULES {
        if rank(role) >= rank(rule.min_role)
            && in_scope(role, position, rule.scope)
            && (rule.situations)(situation)
        {
            caps.set(rule.action);
        }
    }
    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_situations() -> Vec<GuardSituation> {
        let mut out: Vec<GuardSituation> =
            Situation::ALL.into_iter().map(GuardSituation::Subprocess).collect();
        out.extend(ProcessSituation::ALL.into_iter().map(GuardSituation::Process));
        out
    }

    #[test]
    fn every_action_has_a_rule() {
        for action in Action::ALL {
            assert!(RULES.iter().any(|r| r.action == action), "{action} has no rule");
        }
    }

    #[test]
    fn total_over_every_combination() {
        for role in Role::ALL {
            for position in UnitPosition::ALL {
                for situation in all_situations() {
                    let _ = capabilities(role, position, situation);
                }
            }
        }
    }

    #[test]
    fn roles_are_monotonic() {
        for position in UnitPosition::ALL {
            for situation in all_situations() {
                let caps = Role::ALL.map(|r| capabilities(r, position, situation));
                for pair in caps.windows(2) {
                    assert!(
                        pair[0].is_superset_of(&pair[1]),
                        "monotonicity broken at {position:?} / {situation}"
                    );
                }
            }
        }
    }

    #[test]
    fn only_admin_starts_and_finishes() {
        let created = GuardSituation::Process(ProcessSituation::Created);
        let running = GuardSituation::Process(ProcessSituation::InProgress);
        assert!(capabilities(Role::Admin, UnitPosition::Unrelated, created).can_start);
        assert!(!capabilities(Role::Manager, UnitPosition::Own, created).can_start);
        assert!(capabilities(Role::Admin, UnitPosition::Unrelated, running).can_finish);
        assert!(!capabilities(Role::Admin, UnitPosition::Unrelated, created).can_finish);
        let finished = GuardSituation::Process(ProcessSituation::Finished);
        assert!(capabilities(Role::Admin, UnitPosition::Own, finished).is_empty());
    }

    #[test]
    fn unit_level_actions_need_own_unit() {
        let s = GuardSituation::Subprocess(Situation::Cadastro(C::InProgress));
        assert!(capabilities(Role::UnitHead, UnitPosition::Own, s).can_make_available_cadastro);
        assert!(!capabilities(Role::Staff, UnitPosition::Own, s).can_make_available_cadastro);
        assert!(capabilities(Role::Staff, UnitPosition::Own, s).can_edit_cadastro);
        let above = capabilities(Role::UnitHead, UnitPosition::ImmediateSuperior, s);
        assert!(!above.can_edit_cadastro);
    }

    #[test]
    fn review_needs_manager_at_or_above() {
        let s = GuardSituation::Subprocess(Situation::Cadastro(C::MadeAvailable));
        let manager_above = capabilities(Role::Manager, UnitPosition::ImmediateSuperior, s);
        assert!(manager_above.can_accept_cadastro && manager_above.can_return_cadastro);
        assert!(!manager_above.can_homologate_cadastro);
        assert!(!capabilities(Role::Manager, UnitPosition::Unrelated, s).can_accept_cadastro);
        assert!(!capabilities(Role::UnitHead, UnitPosition::Own, s).can_accept_cadastro);
        let admin = capabilities(Role::Admin, UnitPosition::Unrelated, s);
        assert!(admin.can_accept_cadastro && admin.can_homologate_cadastro);
    }

    #[test]
    fn homologated_map_is_frozen() {
        let s = GuardSituation::Subprocess(Situation::Mapa(M::Homologated));
        assert!(capabilities(Role::Admin, UnitPosition::Own, s).is_empty());
    }

    #[test]
    fn allowed_lists_actions_in_order() {
        let s = GuardSituation::Subprocess(Situation::Mapa(M::Validated));
        let allowed: Vec<Action> = capabilities(Role::Manager, UnitPosition::Superior, s)
            .allowed()
            .collect();
        assert_eq!(allowed, vec![Action::AcceptMapa, Action::ReturnMapa]);
    }
}
