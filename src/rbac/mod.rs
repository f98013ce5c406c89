//! Permission matrix core
//!
//! This module owns the data model behind the Users & Roles screen:
//! - Fixed roles and actions
//! - Structured node paths and permission keys
//! - The static module/submodule/popup hierarchy
//! - The permission store with all-or-nothing bulk toggles
//! - Staged popup edits committed on save

pub mod hierarchy;
pub mod path;
pub mod staging;
pub mod store;

pub use hierarchy::{Hierarchy, HierarchyConfig, HierarchyError, ModuleConfig, Node, SubmoduleConfig};
pub use path::{KeyError, NodePath, PermissionId};
pub use staging::{SaveOutcome, StagedEdit};
pub use store::{
    ActionCell, CheckState, MatrixRow, PermissionStore, Seed, Snapshot, ToggleOutcome, ToggleResult,
};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Permission profile assigned to users. The set is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "Admin")]
    Admin,
    #[serde(alias = "Manager")]
    Manager,
    #[serde(alias = "Operator")]
    Operator,
    #[serde(alias = "Employee")]
    Employee,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Manager, Role::Operator, Role::Employee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Operator => "operator",
            Role::Employee => "employee",
        }
    }

    /// Label shown in the admin screen
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Operator => "Operator",
            Role::Employee => "Employee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| KeyError::UnknownRole(s.to_string()))
    }
}

/// Operation verb. The same set applies at every hierarchy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[serde(alias = "View")]
    View,
    #[serde(alias = "Create")]
    Create,
    #[serde(alias = "Edit")]
    Edit,
    #[serde(alias = "Delete")]
    Delete,
}

impl Action {
    /// Column order of the matrix
    pub const ALL: [Action; 4] = [Action::View, Action::Create, Action::Edit, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::View => "View",
            Action::Create => "Create",
            Action::Edit => "Edit",
            Action::Delete => "Delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Action {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Action::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| KeyError::UnknownAction(s.to_string()))
    }
}
