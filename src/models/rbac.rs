use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Decision;
use crate::events::{Loggable, Severity};
use crate::rbac::{Action, CheckState, MatrixRow, PermissionId, Role, SaveOutcome, ToggleResult};

// =============================================================================
// HIERARCHY & ROLES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NodeView {
    #[schema(example = "hrms:attendance:attendance record")]
    pub key: String,
    #[schema(example = "Attendance Record")]
    pub name: String,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "hrms:attendance")]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleSummary {
    pub role: Role,
    #[schema(example = "Operator")]
    pub label: String,
    pub granted: usize,
    pub visible: usize,
}

// =============================================================================
// MATRIX
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ColumnView {
    pub action: Action,
    pub state: CheckState,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatrixResponse {
    pub role: Role,
    pub rows: Vec<MatrixRow>,
    pub columns: Vec<ColumnView>,
    pub all: CheckState,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionListResponse {
    pub role: Role,
    #[schema(example = json!(["inventory#view"]))]
    pub permissions: Vec<String>,
}

// =============================================================================
// MUTATIONS
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPermissionRequest {
    #[schema(example = "inventory")]
    pub path: String,
    #[schema(example = "view")]
    pub action: String,
    pub granted: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetVisibilityRequest {
    #[schema(example = "hrms:attendance")]
    pub path: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NodeStatus {
    pub role: Role,
    #[schema(example = "hrms:attendance")]
    pub path: String,
    pub visible: bool,
    pub granted: Vec<Action>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleColumnRequest {
    #[schema(example = "edit")]
    pub action: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleRowRequest {
    #[schema(example = "crm:leads")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToggleResponse {
    pub role: Role,
    #[serde(flatten)]
    pub result: ToggleResult,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckQuery {
    #[schema(example = "inventory")]
    pub path: String,
    #[schema(example = "view")]
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckResponse {
    pub role: Role,
    pub path: String,
    pub action: Action,
    pub allowed: bool,
    pub decision: Decision,
}

// =============================================================================
// STAGED EDITORS
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenEditorRequest {
    #[schema(example = "manager")]
    pub role: String,
    #[schema(example = "hrms:attendance")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EditorResponse {
    pub id: Uuid,
    pub role: Role,
    #[schema(example = "hrms:attendance")]
    pub parent: String,
    pub dirty: bool,
    pub rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditorToggleRequest {
    #[schema(example = "hrms:attendance:attendance record")]
    pub path: String,
    #[schema(example = "view")]
    pub action: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditorGroupRequest {
    /// Empty means every action
    #[serde(default)]
    #[schema(example = json!(["view", "edit"]))]
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EditorToggleResponse {
    /// False when the checkbox is disabled
    pub applied: bool,
    #[serde(flatten)]
    pub editor: EditorResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveResponse {
    pub id: Uuid,
    /// "unchanged" or "committed"
    #[schema(example = "committed")]
    pub status: String,
    pub granted: Vec<String>,
    pub revoked: Vec<String>,
}

impl SaveResponse {
    pub fn new(id: Uuid, outcome: &SaveOutcome) -> Self {
        let keys = |ids: &[PermissionId]| ids.iter().map(PermissionId::to_string).collect();
        match outcome {
            SaveOutcome::Unchanged => Self {
                id,
                status: "unchanged".to_string(),
                granted: Vec::new(),
                revoked: Vec::new(),
            },
            SaveOutcome::Committed { granted, revoked } => Self {
                id,
                status: "committed".to_string(),
                granted: keys(granted),
                revoked: keys(revoked),
            },
        }
    }
}

// =============================================================================
// ACTIVITY
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PermissionChange {
    pub role: Role,
    pub permission: String,
}

impl Loggable for PermissionChange {
    fn entity_type() -> &'static str { "permission" }
    fn subject(&self) -> String { self.permission.clone() }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, Serialize)]
pub struct VisibilityChange {
    pub role: Role,
    pub path: String,
    pub visible: bool,
}

impl Loggable for VisibilityChange {
    fn entity_type() -> &'static str { "visibility" }
    fn subject(&self) -> String { self.path.clone() }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkToggle {
    pub role: Role,
    /// "column", "all" or "row"
    pub scope: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub result: ToggleResult,
}

impl Loggable for BulkToggle {
    fn entity_type() -> &'static str { "bulk_toggle" }
    fn subject(&self) -> String { self.role.as_str().to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleChange {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Role>,
}

impl Loggable for RoleChange {
    fn entity_type() -> &'static str { "role" }
    fn subject(&self) -> String { self.role.as_str().to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, Serialize)]
pub struct EditorChange {
    pub id: Uuid,
    pub role: Role,
    pub parent: String,
    /// Staged checkbox, e.g. "hrms/attendance/attendance record#edit"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SaveOutcome>,
}

impl Loggable for EditorChange {
    fn entity_type() -> &'static str { "editor" }
    fn subject(&self) -> String { self.id.to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}
