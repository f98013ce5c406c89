use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::hierarchy::Hierarchy;
use super::path::{NodePath, PermissionId};
use super::{Action, Role};

/// Full permission and visibility state.
///
/// Ordered maps keep the serialized form deterministic, so two snapshots
/// with equal content serialize to identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub permissions: BTreeMap<Role, BTreeSet<PermissionId>>,
    pub visibility: BTreeMap<Role, BTreeMap<NodePath, bool>>,
}

/// Initial state applied when a store is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Seed {
    /// Roles that start with every node visible and every action granted
    pub full_access: Vec<Role>,
}

impl Seed {
    pub fn admin() -> Self {
        Self {
            full_access: vec![Role::Admin],
        }
    }
}

/// Summary of a header checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Checked,
    Unchecked,
    Indeterminate,
}

impl CheckState {
    fn from_coverage(granted: usize, total: usize) -> Self {
        if total == 0 || granted == 0 {
            CheckState::Unchecked
        } else if granted == total {
            CheckState::Checked
        } else {
            CheckState::Indeterminate
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    Granted,
    Revoked,
    /// Nothing was in scope
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ToggleResult {
    pub outcome: ToggleOutcome,
    /// Number of (node, action) pairs in scope
    pub affected: usize,
}

impl ToggleResult {
    fn skipped() -> Self {
        Self {
            outcome: ToggleOutcome::Skipped,
            affected: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActionCell {
    pub action: Action,
    pub granted: bool,
    /// Hidden nodes render with disabled checkboxes
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MatrixRow {
    #[schema(example = "hrms:attendance")]
    pub key: String,
    #[schema(example = "Attendance")]
    pub name: String,
    pub depth: usize,
    pub visible: bool,
    pub actions: Vec<ActionCell>,
}

/// Grants `ids` to all of them, or revokes from all of them when every
/// one is already held.
pub(crate) fn toggle_uniform(granted: &mut BTreeSet<PermissionId>, ids: Vec<PermissionId>) -> ToggleResult {
    if ids.is_empty() {
        return ToggleResult::skipped();
    }

    let affected = ids.len();
    if ids.iter().all(|id| granted.contains(id)) {
        for id in &ids {
            granted.remove(id);
        }
        ToggleResult {
            outcome: ToggleOutcome::Revoked,
            affected,
        }
    } else {
        granted.extend(ids);
        ToggleResult {
            outcome: ToggleOutcome::Granted,
            affected,
        }
    }
}

/// Owns role to grant and role to visibility state for one admin session.
#[derive(Debug, Clone)]
pub struct PermissionStore {
    hierarchy: Arc<Hierarchy>,
    state: Snapshot,
}

impl PermissionStore {
    pub fn new(hierarchy: Arc<Hierarchy>) -> Self {
        Self {
            hierarchy,
            state: Snapshot::default(),
        }
    }

    pub fn seeded(hierarchy: Arc<Hierarchy>, seed: &Seed) -> Self {
        let mut store = Self::new(hierarchy);
        for role in &seed.full_access {
            let paths: Vec<NodePath> = store.hierarchy.paths().cloned().collect();
            for path in paths {
                store.set_visibility(*role, &path, true);
                for action in Action::ALL {
                    store.set_permission(*role, &path, action, true);
                }
            }
        }
        store
    }

    pub fn hierarchy(&self) -> &Arc<Hierarchy> {
        &self.hierarchy
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.clone()
    }

    // =========================================================================
    // SINGLE NODE
    // =========================================================================

    pub fn permission_state(&self, role: Role, path: &NodePath, action: Action) -> bool {
        self.state
            .permissions
            .get(&role)
            .map(|set| set.contains(&PermissionId::new(path.clone(), action)))
            .unwrap_or(false)
    }

    /// Does not consult visibility.
    pub fn set_permission(&mut self, role: Role, path: &NodePath, action: Action, granted: bool) {
        let id = PermissionId::new(path.clone(), action);
        let set = self.state.permissions.entry(role).or_default();
        if granted {
            set.insert(id);
        } else {
            set.remove(&id);
        }
    }

    pub fn visibility(&self, role: Role, path: &NodePath) -> bool {
        self.state
            .visibility
            .get(&role)
            .and_then(|flags| flags.get(path))
            .copied()
            .unwrap_or(false)
    }

    /// Upserts the flag for this node only. Children and grants are untouched.
    pub fn set_visibility(&mut self, role: Role, path: &NodePath, visible: bool) {
        self.state
            .visibility
            .entry(role)
            .or_default()
            .insert(path.clone(), visible);
    }

    pub fn granted(&self, role: Role) -> Vec<PermissionId> {
        self.state
            .permissions
            .get(&role)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn granted_set(&self, role: Role) -> BTreeSet<PermissionId> {
        self.state.permissions.get(&role).cloned().unwrap_or_default()
    }

    // =========================================================================
    // BULK TOGGLES
    // =========================================================================

    fn visible_paths(&self, role: Role) -> Vec<NodePath> {
        self.hierarchy
            .paths()
            .filter(|path| self.visibility(role, path))
            .cloned()
            .collect()
    }

    fn toggle(&mut self, role: Role, ids: Vec<PermissionId>) -> ToggleResult {
        if ids.is_empty() {
            return ToggleResult::skipped();
        }
        let set = self.state.permissions.entry(role).or_default();
        toggle_uniform(set, ids)
    }

    /// Header checkbox of one action column.
    pub fn toggle_column(&mut self, role: Role, action: Action) -> ToggleResult {
        let ids = self
            .visible_paths(role)
            .into_iter()
            .map(|path| PermissionId::new(path, action))
            .collect();
        let result = self.toggle(role, ids);
        tracing::debug!(role = %role, action = %action, ?result, "column toggled");
        result
    }

    /// "Select all" across every visible node and action.
    pub fn toggle_all(&mut self, role: Role) -> ToggleResult {
        let ids = self
            .visible_paths(role)
            .into_iter()
            .flat_map(|path| Action::ALL.map(|action| PermissionId::new(path.clone(), action)))
            .collect();
        let result = self.toggle(role, ids);
        tracing::debug!(role = %role, ?result, "all toggled");
        result
    }

    /// Row checkbox: every action of one node. Hidden nodes are skipped.
    pub fn toggle_row(&mut self, role: Role, path: &NodePath) -> ToggleResult {
        if !self.visibility(role, path) {
            return ToggleResult::skipped();
        }
        let ids = Action::ALL
            .map(|action| PermissionId::new(path.clone(), action))
            .to_vec();
        self.toggle(role, ids)
    }

    pub fn column_state(&self, role: Role, action: Action) -> CheckState {
        let visible = self.visible_paths(role);
        let granted = visible
            .iter()
            .filter(|path| self.permission_state(role, path, action))
            .count();
        CheckState::from_coverage(granted, visible.len())
    }

    pub fn all_state(&self, role: Role) -> CheckState {
        let visible = self.visible_paths(role);
        let granted = visible
            .iter()
            .map(|path| {
                Action::ALL
                    .into_iter()
                    .filter(|action| self.permission_state(role, path, *action))
                    .count()
            })
            .sum();
        CheckState::from_coverage(granted, visible.len() * Action::ALL.len())
    }

    // =========================================================================
    // ROLE LEVEL
    // =========================================================================

    pub fn reset_role(&mut self, role: Role) {
        self.state.permissions.remove(&role);
        self.state.visibility.remove(&role);
    }

    /// Replaces `to`'s grants and visibility with a copy of `from`'s.
    pub fn copy_role(&mut self, from: Role, to: Role) {
        if from == to {
            return;
        }
        let permissions = self.state.permissions.get(&from).cloned().unwrap_or_default();
        let visibility = self.state.visibility.get(&from).cloned().unwrap_or_default();
        self.state.permissions.insert(to, permissions);
        self.state.visibility.insert(to, visibility);
    }

    pub(crate) fn apply(&mut self, role: Role, grant: &[PermissionId], revoke: &[PermissionId]) {
        let set = self.state.permissions.entry(role).or_default();
        for id in revoke {
            set.remove(id);
        }
        set.extend(grant.iter().cloned());
    }

    // =========================================================================
    // VIEW
    // =========================================================================

    pub fn row(&self, role: Role, path: &NodePath, name: &str) -> MatrixRow {
        let visible = self.visibility(role, path);
        MatrixRow {
            key: path.visibility_key(),
            name: name.to_string(),
            depth: path.depth(),
            visible,
            actions: Action::ALL
                .into_iter()
                .map(|action| ActionCell {
                    action,
                    granted: self.permission_state(role, path, action),
                    enabled: visible,
                })
                .collect(),
        }
    }

    pub fn matrix(&self, role: Role) -> Vec<MatrixRow> {
        self.hierarchy
            .nodes()
            .iter()
            .map(|node| self.row(role, &node.path, &node.name))
            .collect()
    }
}
