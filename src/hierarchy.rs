//! Read model over the organizational unit tree.
//!
//! Units live in a flat arena; parent and children are arena indices. The
//! structure is immutable once built: a new hierarchy snapshot from the
//! remote service means building a new [`UnitHierarchy`] and swapping it in.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ProcessType, UnitId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("cycle detected in unit hierarchy at unit {unit}")]
    CycleDetected { unit: UnitId },

    #[error("unit {unit} references missing parent {parent}")]
    OrphanReference { unit: UnitId, parent: UnitId },

    #[error("unit {unit} appears more than once in the hierarchy")]
    DuplicateUnit { unit: UnitId },
}

/// A unit as delivered by the remote service, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUnit {
    pub code: String,
    pub name: String,
    pub parent: Option<UnitId>,
    pub steward: Option<String>,
    /// Process type the service declared this unit eligible for, if any.
    pub eligible_for: Option<ProcessType>,
}

#[derive(Debug, Clone)]
pub struct Unit {
    pub id: UnitId,
    pub code: String,
    pub name: String,
    pub steward: Option<String>,
    eligible_for: Option<ProcessType>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Frozen copy of a unit taken when a process starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub code: String,
    pub name: String,
    pub parent: Option<UnitId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionState {
    Unchecked,
    Checked,
    Indeterminate,
}

/// Where a target unit sits relative to the acting unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitPosition {
    /// The acting unit is the target unit.
    Own,
    /// The acting unit is the target's direct parent.
    ImmediateSuperior,
    /// The acting unit is a higher ancestor of the target.
    Superior,
    Unrelated,
}

impl UnitPosition {
    pub const ALL: [UnitPosition; 4] = [
        UnitPosition::Own,
        UnitPosition::ImmediateSuperior,
        UnitPosition::Superior,
        UnitPosition::Unrelated,
    ];

    /// True for the target itself or any of its ancestors.
    pub fn at_or_above(self) -> bool {
        !matches!(self, UnitPosition::Unrelated)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UnitHierarchy {
    nodes: Vec<Unit>,
    index: HashMap<UnitId, usize>,
    roots: Vec<usize>,
    preorder: Vec<usize>,
}

/// Validates raw units and builds the arena.
///
/// Children are ordered by unit id so that repeated builds from the same
/// input produce the same traversal order.
pub fn build_tree(units: HashMap<UnitId, RawUnit>) -> Result<UnitHierarchy, HierarchyError> {
    let mut ids: Vec<UnitId> = units.keys().copied().collect();
    ids.sort();

    for id in &ids {
        if let Some(parent) = units[id].parent
            && !units.contains_key(&parent)
        {
            return Err(HierarchyError::OrphanReference { unit: *id, parent });
        }
    }

    // 0 = unvisited, 1 = on the current parent walk, 2 = known to reach a root.
    let mut mark: HashMap<UnitId, u8> = HashMap::with_capacity(ids.len());
    for &start in &ids {
        let mut walk = Vec::new();
        let mut current = Some(start);
        while let Some(id) = current {
            match mark.get(&id).copied().unwrap_or(0) {
                2 => break,
                1 => return Err(HierarchyError::CycleDetected { unit: id }),
                _ => {
                    mark.insert(id, 1);
                    walk.push(id);
                    current = units[&id].parent;
                }
            }
        }
        for id in walk {
            mark.insert(id, 2);
        }
    }

    let index: HashMap<UnitId, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut nodes: Vec<Unit> = ids
        .iter()
        .map(|id| {
            let raw = &units[id];
            Unit {
                id: *id,
                code: raw.code.clone(),
                name: raw.name.clone(),
                steward: raw.steward.clone(),
                eligible_for: raw.eligible_for,
                parent: raw.parent.map(|p| index[&p]),
                children: Vec::new(),
            }
        })
        .collect();

    let mut roots = Vec::new();
    for i in 0..nodes.len() {
        let parent = nodes[i].parent;
        match parent {
            Some(p) => nodes[p].children.push(i),
            None => roots.push(i),
        }
    }

    let mut preorder = Vec::with_capacity(nodes.len());
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        preorder.push(i);
        stack.extend(nodes[i].children.iter().rev());
    }

    Ok(UnitHierarchy {
        nodes,
        index,
        roots,
        preorder,
    })
}

impl UnitHierarchy {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        self.index.contains_key(&unit)
    }

    pub fn get(&self, unit: UnitId) -> Option<&Unit> {
        self.index.get(&unit).map(|&i| &self.nodes[i])
    }

    pub fn by_code(&self, code: &str) -> Option<&Unit> {
        self.nodes.iter().find(|u| u.code == code)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Unit> {
        self.roots.iter().map(|&i| &self.nodes[i])
    }

    /// Every unit in pre-order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.preorder.iter().map(|&i| &self.nodes[i])
    }

    pub fn children(&self, unit: UnitId) -> impl Iterator<Item = &Unit> {
        self.index
            .get(&unit)
            .into_iter()
            .flat_map(|&i| self.nodes[i].children.iter().map(|&c| &self.nodes[c]))
    }

    pub fn parent(&self, unit: UnitId) -> Option<&Unit> {
        let i = *self.index.get(&unit)?;
        self.nodes[i].parent.map(|p| &self.nodes[p])
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self, unit: UnitId) -> impl Iterator<Item = &Unit> {
        let mut next = self.index.get(&unit).and_then(|&i| self.nodes[i].parent);
        std::iter::from_fn(move || {
            let i = next?;
            next = self.nodes[i].parent;
            Some(&self.nodes[i])
        })
    }

    /// Mirrors the eligibility flag served with the tree; never recomputed.
    pub fn is_eligible(&self, unit: UnitId, process_type: ProcessType) -> bool {
        self.get(unit)
            .is_some_and(|u| u.eligible_for == Some(process_type))
    }

    /// True when `unit` is a strict descendant of `superior`.
    pub fn is_subordinate(&self, unit: UnitId, superior: UnitId) -> bool {
        self.ancestors(unit).any(|a| a.id == superior)
    }

    pub fn is_immediate_superior(&self, unit: UnitId, candidate: UnitId) -> bool {
        self.parent(unit).is_some_and(|p| p.id == candidate)
    }

    pub fn position_of(&self, acting: UnitId, target: UnitId) -> UnitPosition {
        if acting == target && self.contains(target) {
            UnitPosition::Own
        } else if self.is_immediate_superior(target, acting) {
            UnitPosition::ImmediateSuperior
        } else if self.is_subordinate(target, acting) {
            UnitPosition::Superior
        } else {
            UnitPosition::Unrelated
        }
    }

    /// Strict descendants of `unit` in pre-order. Unknown units yield nothing.
    pub fn subordinate_units(&self, unit: UnitId) -> Subordinates<'_> {
        let stack: Vec<usize> = self
            .index
            .get(&unit)
            .map(|&i| self.nodes[i].children.iter().rev().copied().collect())
            .unwrap_or_default();
        Subordinates {
            hierarchy: self,
            stack,
        }
    }

    /// Tri-state of every unit, computed bottom-up in one pass.
    pub fn selection_states(&self, selected: &HashSet<UnitId>) -> SelectionMap<'_> {
        let n = self.nodes.len();
        let mut states = vec![SelectionState::Unchecked; n];
        let mut any_checked_below = vec![false; n];
        let mut all_checked_below = vec![true; n];

        for &i in self.preorder.iter().rev() {
            let mut any = false;
            let mut all = true;
            for &c in &self.nodes[i].children {
                let child_checked = states[c] == SelectionState::Checked;
                any |= child_checked || any_checked_below[c];
                all &= child_checked && all_checked_below[c];
            }
            any_checked_below[i] = any;
            all_checked_below[i] = all;
            states[i] = if selected.contains(&self.nodes[i].id) {
                SelectionState::Checked
            } else if any && !all {
                SelectionState::Indeterminate
            } else {
                SelectionState::Unchecked
            };
        }

        SelectionMap {
            index: &self.index,
            states,
        }
    }

    pub fn selection_state(&self, unit: UnitId, selected: &HashSet<UnitId>) -> SelectionState {
        self.selection_states(selected).get(unit)
    }

    /// Frozen copies of the selected units, in hierarchy pre-order.
    ///
    /// Returns the first unknown unit as the error.
    pub fn snapshot(&self, selected: &[UnitId]) -> Result<Vec<UnitSnapshot>, UnitId> {
        if let Some(missing) = selected.iter().find(|id| !self.contains(**id)) {
            return Err(*missing);
        }
        let wanted: HashSet<UnitId> = selected.iter().copied().collect();
        Ok(self
            .units()
            .filter(|u| wanted.contains(&u.id))
            .map(|u| UnitSnapshot {
                id: u.id,
                code: u.code.clone(),
                name: u.name.clone(),
                parent: u.parent.map(|p| self.nodes[p].id),
            })
            .collect())
    }
}

/// Result of [`UnitHierarchy::selection_states`].
pub struct SelectionMap<'a> {
    index: &'a HashMap<UnitId, usize>,
    states: Vec<SelectionState>,
}

impl SelectionMap<'_> {
    /// Unknown units read as unchecked.
    pub fn get(&self, unit: UnitId) -> SelectionState {
        self.index
            .get(&unit)
            .map(|&i| self.states[i])
            .unwrap_or(SelectionState::Unchecked)
    }
}

/// Lazy pre-order walk over strict descendants. Cloning restarts from the
/// clone's position.
#[derive(Clone)]
pub struct Subordinates<'a> {
    hierarchy: &'a UnitHierarchy,
    stack: Vec<usize>,
}

impl<'a> Iterator for Subordinates<'a> {
    type Item = &'a Unit;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.stack.pop()?;
        let node = &self.hierarchy.nodes[i];
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
