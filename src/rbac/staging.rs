//! Staged edits for the "Configure" dialog.
//!
//! The dialog edits the popup-level children of one node. Changes are held
//! in a private copy of the role's grants and reach the store only through
//! [`StagedEdit::save`]; dropping the editor discards them.
//!
//! Visibility is read from the store again on save: a node hidden while the
//! dialog was open keeps its committed grants untouched.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::hierarchy::HierarchyError;
use super::path::{NodePath, PermissionId};
use super::store::{toggle_uniform, ActionCell, MatrixRow, PermissionStore, ToggleResult};
use super::{Action, Role};

#[derive(Debug, Clone)]
struct StagedNode {
    path: NodePath,
    name: String,
    visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SaveOutcome {
    /// Nothing was staged; the store was not touched
    Unchanged,
    Committed {
        granted: Vec<PermissionId>,
        revoked: Vec<PermissionId>,
    },
}

#[derive(Debug, Clone)]
pub struct StagedEdit {
    role: Role,
    parent: NodePath,
    nodes: Vec<StagedNode>,
    baseline: BTreeSet<PermissionId>,
    staged: BTreeSet<PermissionId>,
    opened_at: DateTime<Utc>,
}

impl StagedEdit {
    /// Copies the role's grants for the children of `parent`. Visibility is
    /// captured as of now and decides which checkboxes are enabled.
    pub fn open(store: &PermissionStore, role: Role, parent: &NodePath) -> Result<Self, HierarchyError> {
        let hierarchy = store.hierarchy();
        if !hierarchy.contains(parent) {
            return Err(HierarchyError::UnknownNode(parent.visibility_key()));
        }

        let nodes: Vec<StagedNode> = hierarchy
            .children(parent)
            .map(|node| StagedNode {
                path: node.path.clone(),
                name: node.name.clone(),
                visible: store.visibility(role, &node.path),
            })
            .collect();

        let baseline: BTreeSet<PermissionId> = store
            .granted_set(role)
            .into_iter()
            .filter(|id| nodes.iter().any(|node| &node.path == id.path()))
            .collect();

        tracing::debug!(role = %role, parent = %parent, children = nodes.len(), "staged edit opened");

        Ok(Self {
            role,
            parent: parent.clone(),
            staged: baseline.clone(),
            baseline,
            nodes,
            opened_at: Utc::now(),
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn parent(&self) -> &NodePath {
        &self.parent
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn is_dirty(&self) -> bool {
        self.staged != self.baseline
    }

    pub fn state(&self, path: &NodePath, action: Action) -> bool {
        self.staged.contains(&PermissionId::new(path.clone(), action))
    }

    fn node(&self, path: &NodePath) -> Option<&StagedNode> {
        self.nodes.iter().find(|node| &node.path == path)
    }

    /// Re-reads visibility from the store so the enabled checkboxes follow
    /// changes made outside the dialog. Staged values are kept.
    pub fn refresh(&mut self, store: &PermissionStore) {
        for node in &mut self.nodes {
            node.visible = store.visibility(self.role, &node.path);
        }
    }

    /// Flips one checkbox. Returns false, changing nothing, when the node is
    /// hidden or outside this dialog.
    pub fn toggle(&mut self, path: &NodePath, action: Action) -> bool {
        match self.node(path) {
            Some(node) if node.visible => {}
            _ => return false,
        }

        let id = PermissionId::new(path.clone(), action);
        if !self.staged.remove(&id) {
            self.staged.insert(id);
        }
        true
    }

    /// All-or-nothing over every visible child and each of `actions`.
    pub fn toggle_nested_group(&mut self, actions: &[Action]) -> ToggleResult {
        let ids = self
            .nodes
            .iter()
            .filter(|node| node.visible)
            .flat_map(|node| actions.iter().map(|action| PermissionId::new(node.path.clone(), *action)))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        toggle_uniform(&mut self.staged, ids)
    }

    pub fn rows(&self) -> Vec<MatrixRow> {
        self.nodes
            .iter()
            .map(|node| MatrixRow {
                key: node.path.visibility_key(),
                name: node.name.clone(),
                depth: node.path.depth(),
                visible: node.visible,
                actions: Action::ALL
                    .into_iter()
                    .map(|action| ActionCell {
                        action,
                        granted: self.state(&node.path, action),
                        enabled: node.visible,
                    })
                    .collect(),
            })
            .collect()
    }

    /// Applies the staged difference to the store in one step. Changes on
    /// nodes that are hidden at commit time are dropped.
    pub fn save(self, store: &mut PermissionStore) -> SaveOutcome {
        if !self.is_dirty() {
            return SaveOutcome::Unchanged;
        }

        let role = self.role;
        let visible = |id: &&PermissionId| store.visibility(role, id.path());
        let changed = self.staged.symmetric_difference(&self.baseline).count();
        let granted: Vec<PermissionId> = self
            .staged
            .difference(&self.baseline)
            .filter(|id| visible(id))
            .cloned()
            .collect();
        let revoked: Vec<PermissionId> = self
            .baseline
            .difference(&self.staged)
            .filter(|id| visible(id))
            .cloned()
            .collect();

        let dropped = changed - granted.len() - revoked.len();
        if dropped > 0 {
            tracing::debug!(role = %role, parent = %self.parent, dropped, "staged changes on hidden nodes dropped");
        }
        if granted.is_empty() && revoked.is_empty() {
            return SaveOutcome::Unchanged;
        }

        store.apply(role, &granted, &revoked);
        tracing::debug!(
            role = %role,
            parent = %self.parent,
            granted = granted.len(),
            revoked = revoked.len(),
            "staged edit committed"
        );
        SaveOutcome::Committed { granted, revoked }
    }

    pub fn cancel(self) {
        tracing::debug!(role = %self.role, parent = %self.parent, "staged edit discarded");
    }
}
