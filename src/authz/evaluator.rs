use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::rbac::{Action, NodePath, PermissionStore, Role};

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    /// The action is granted but the node is not shown for the role
    Hidden,
    NotGranted,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Access evaluator trait for pluggable authorization logic
#[async_trait]
pub trait AccessEvaluator: Send + Sync {
    async fn evaluate(&self, store: &PermissionStore, role: Role, path: &NodePath, action: Action) -> Decision;

    /// Check if the role may perform `action` on the node
    async fn can(&self, store: &PermissionStore, role: Role, path: &NodePath, action: Action) -> bool {
        self.evaluate(store, role, path, action).await.is_allowed()
    }
}

/// Default evaluator
///
/// Evaluation order:
/// 1. action not granted -> not_granted
/// 2. node hidden for the role -> hidden
/// 3. allow
#[derive(Debug, Clone, Default)]
pub struct DefaultAccessEvaluator;

impl DefaultAccessEvaluator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AccessEvaluator for DefaultAccessEvaluator {
    async fn evaluate(&self, store: &PermissionStore, role: Role, path: &NodePath, action: Action) -> Decision {
        if !store.permission_state(role, path, action) {
            tracing::debug!(role = %role, path = %path, action = %action, "permission not granted");
            return Decision::NotGranted;
        }

        if !store.visibility(role, path) {
            tracing::debug!(role = %role, path = %path, action = %action, "node hidden");
            return Decision::Hidden;
        }

        tracing::debug!(role = %role, path = %path, action = %action, "access allowed");
        Decision::Allowed
    }
}
