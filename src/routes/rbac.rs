//! Permission matrix admin API
//!
//! Endpoints backing the Users & Roles screen: hierarchy, per-role matrix,
//! single grants, visibility flags and the bulk checkboxes.
//! Every mutation is published on the activity bus.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post, put},
    Json, Router,
};

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::models::rbac::*;
use crate::rbac::{Action, Node, NodePath, PermissionId, PermissionStore, Role};

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/hierarchy", get(get_hierarchy))
        .route("/roles", get(list_roles))
        .route("/roles/:role/matrix", get(get_matrix))
        .route("/roles/:role/permissions", get(list_permissions).put(set_permission))
        .route("/roles/:role/permissions/check", get(check_permission))
        .route("/roles/:role/visibility", put(set_visibility))
        .route("/roles/:role/toggle-column", post(toggle_column))
        .route("/roles/:role/toggle-all", post(toggle_all))
        .route("/roles/:role/toggle-row", post(toggle_row))
        .route("/roles/:role/reset", post(reset_role))
        .route("/roles/:role/copy-from/:source", post(copy_role))
}

pub(crate) fn parse_role(raw: &str) -> AppResult<Role> {
    Ok(raw.parse::<Role>()?)
}

pub(crate) fn parse_action(raw: &str) -> AppResult<Action> {
    Ok(raw.parse::<Action>()?)
}

/// Resolves a visibility key against the hierarchy: 400 when malformed,
/// 404 when well formed but not configured.
pub(crate) fn resolve_node(store: &PermissionStore, key: &str) -> AppResult<Node> {
    store
        .hierarchy()
        .resolve(key)?
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("node '{key}'")))
}

fn node_status(store: &PermissionStore, role: Role, path: &NodePath) -> NodeStatus {
    NodeStatus {
        role,
        path: path.visibility_key(),
        visible: store.visibility(role, path),
        granted: Action::ALL
            .into_iter()
            .filter(|action| store.permission_state(role, path, *action))
            .collect(),
    }
}

// =============================================================================
// HIERARCHY & ROLES
// =============================================================================

/// List every node of the feature hierarchy in display order
#[utoipa::path(
    get,
    path = "/rbac/hierarchy",
    tag = "RBAC",
    responses(
        (status = 200, description = "Hierarchy nodes", body = Vec<NodeView>),
    )
)]
pub async fn get_hierarchy(State(state): State<AppState>) -> AppResult<Json<Vec<NodeView>>> {
    let store = state.store.read().await;
    let nodes = store
        .hierarchy()
        .nodes()
        .iter()
        .map(|node| NodeView {
            key: node.path.visibility_key(),
            name: node.name.clone(),
            depth: node.depth(),
            parent: node.path.parent().map(|p| p.visibility_key()),
        })
        .collect();

    Ok(Json(nodes))
}

/// List the fixed roles with their grant and visibility counts
#[utoipa::path(
    get,
    path = "/rbac/roles",
    tag = "RBAC",
    responses(
        (status = 200, description = "List of roles", body = Vec<RoleSummary>),
    )
)]
pub async fn list_roles(State(state): State<AppState>) -> AppResult<Json<Vec<RoleSummary>>> {
    let store = state.store.read().await;
    let roles = Role::ALL
        .into_iter()
        .map(|role| RoleSummary {
            role,
            label: role.label().to_string(),
            granted: store.granted(role).len(),
            visible: store
                .hierarchy()
                .paths()
                .filter(|path| store.visibility(role, path))
                .count(),
        })
        .collect();

    Ok(Json(roles))
}

// =============================================================================
// MATRIX & PERMISSIONS
// =============================================================================

/// Render the permission matrix of a role
#[utoipa::path(
    get,
    path = "/rbac/roles/{role}/matrix",
    tag = "RBAC",
    params(
        ("role" = String, Path, description = "Role name"),
    ),
    responses(
        (status = 200, description = "Matrix rows and header states", body = MatrixResponse),
        (status = 400, description = "Unknown role"),
    )
)]
pub async fn get_matrix(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> AppResult<Json<MatrixResponse>> {
    let role = parse_role(&role)?;
    let store = state.store.read().await;

    Ok(Json(MatrixResponse {
        role,
        rows: store.matrix(role),
        columns: Action::ALL
            .into_iter()
            .map(|action| ColumnView {
                action,
                state: store.column_state(role, action),
            })
            .collect(),
        all: store.all_state(role),
    }))
}

/// List granted permission keys of a role
#[utoipa::path(
    get,
    path = "/rbac/roles/{role}/permissions",
    tag = "RBAC",
    params(
        ("role" = String, Path, description = "Role name"),
    ),
    responses(
        (status = 200, description = "Granted permissions", body = PermissionListResponse),
        (status = 400, description = "Unknown role"),
    )
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> AppResult<Json<PermissionListResponse>> {
    let role = parse_role(&role)?;
    let store = state.store.read().await;

    Ok(Json(PermissionListResponse {
        role,
        permissions: store.granted(role).iter().map(PermissionId::to_string).collect(),
    }))
}

/// Grant or revoke one action on one node
#[utoipa::path(
    put,
    path = "/rbac/roles/{role}/permissions",
    tag = "RBAC",
    params(
        ("role" = String, Path, description = "Role name"),
    ),
    request_body = SetPermissionRequest,
    responses(
        (status = 200, description = "Node state after the change", body = NodeStatus),
        (status = 400, description = "Unknown role or action"),
        (status = 404, description = "Node not found"),
    )
)]
pub async fn set_permission(
    State(state): State<AppState>,
    Path(role): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SetPermissionRequest>,
) -> AppResult<Json<NodeStatus>> {
    let role = parse_role(&role)?;
    let action = parse_action(&req.action)?;
    let mut store = state.store.write().await;
    let node = resolve_node(&store, &req.path)?;

    store.set_permission(role, &node.path, action, req.granted);
    let status = node_status(&store, role, &node.path);
    drop(store);

    log_activity(
        &state.event_bus,
        if req.granted { "granted" } else { "revoked" },
        &PermissionChange {
            role,
            permission: PermissionId::new(node.path, action).to_string(),
        },
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(status))
}

/// Check effective access (visible and granted)
#[utoipa::path(
    get,
    path = "/rbac/roles/{role}/permissions/check",
    tag = "RBAC",
    params(
        ("role" = String, Path, description = "Role name"),
        ("path" = String, Query, description = "Visibility key of the node"),
        ("action" = String, Query, description = "Action name"),
    ),
    responses(
        (status = 200, description = "Access decision", body = CheckResponse),
        (status = 400, description = "Unknown role or action"),
        (status = 404, description = "Node not found"),
    )
)]
pub async fn check_permission(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Query(query): Query<CheckQuery>,
) -> AppResult<Json<CheckResponse>> {
    let role = parse_role(&role)?;
    let action = parse_action(&query.action)?;
    let store = state.store.read().await;
    let node = resolve_node(&store, &query.path)?;

    let decision = state.evaluator.evaluate(&store, role, &node.path, action).await;

    Ok(Json(CheckResponse {
        role,
        path: node.path.visibility_key(),
        action,
        allowed: decision.is_allowed(),
        decision,
    }))
}

/// Show or hide a node in navigation. Grants are left as they are.
#[utoipa::path(
    put,
    path = "/rbac/roles/{role}/visibility",
    tag = "RBAC",
    params(
        ("role" = String, Path, description = "Role name"),
    ),
    request_body = SetVisibilityRequest,
    responses(
        (status = 200, description = "Node state after the change", body = NodeStatus),
        (status = 400, description = "Unknown role"),
        (status = 404, description = "Node not found"),
    )
)]
pub async fn set_visibility(
    State(state): State<AppState>,
    Path(role): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SetVisibilityRequest>,
) -> AppResult<Json<NodeStatus>> {
    let role = parse_role(&role)?;
    let mut store = state.store.write().await;
    let node = resolve_node(&store, &req.path)?;

    store.set_visibility(role, &node.path, req.visible);
    let status = node_status(&store, role, &node.path);
    drop(store);

    log_activity(
        &state.event_bus,
        if req.visible { "shown" } else { "hidden" },
        &VisibilityChange {
            role,
            path: status.path.clone(),
            visible: req.visible,
        },
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(status))
}

// =============================================================================
// BULK TOGGLES
// =============================================================================

/// Column header checkbox: all-or-nothing over visible nodes
#[utoipa::path(
    post,
    path = "/rbac/roles/{role}/toggle-column",
    tag = "RBAC",
    params(
        ("role" = String, Path, description = "Role name"),
    ),
    request_body = ToggleColumnRequest,
    responses(
        (status = 200, description = "Toggle applied", body = ToggleResponse),
        (status = 400, description = "Unknown role or action"),
    )
)]
pub async fn toggle_column(
    State(state): State<AppState>,
    Path(role): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ToggleColumnRequest>,
) -> AppResult<Json<ToggleResponse>> {
    let role = parse_role(&role)?;
    let action = parse_action(&req.action)?;
    let result = state.store.write().await.toggle_column(role, action);

    log_activity(
        &state.event_bus,
        "toggled",
        &BulkToggle {
            role,
            scope: "column",
            target: Some(action.as_str().to_string()),
            result,
        },
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(ToggleResponse { role, result }))
}

/// "Select all" checkbox: all-or-nothing over visible nodes and every action
#[utoipa::path(
    post,
    path = "/rbac/roles/{role}/toggle-all",
    tag = "RBAC",
    params(
        ("role" = String, Path, description = "Role name"),
    ),
    responses(
        (status = 200, description = "Toggle applied", body = ToggleResponse),
        (status = 400, description = "Unknown role"),
    )
)]
pub async fn toggle_all(
    State(state): State<AppState>,
    Path(role): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<ToggleResponse>> {
    let role = parse_role(&role)?;
    let result = state.store.write().await.toggle_all(role);

    log_activity(
        &state.event_bus,
        "toggled",
        &BulkToggle {
            role,
            scope: "all",
            target: None,
            result,
        },
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(ToggleResponse { role, result }))
}

/// Row checkbox: every action of one visible node
#[utoipa::path(
    post,
    path = "/rbac/roles/{role}/toggle-row",
    tag = "RBAC",
    params(
        ("role" = String, Path, description = "Role name"),
    ),
    request_body = ToggleRowRequest,
    responses(
        (status = 200, description = "Toggle applied", body = ToggleResponse),
        (status = 400, description = "Unknown role"),
        (status = 404, description = "Node not found"),
    )
)]
pub async fn toggle_row(
    State(state): State<AppState>,
    Path(role): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ToggleRowRequest>,
) -> AppResult<Json<ToggleResponse>> {
    let role = parse_role(&role)?;
    let mut store = state.store.write().await;
    let node = resolve_node(&store, &req.path)?;
    let result = store.toggle_row(role, &node.path);
    drop(store);

    log_activity(
        &state.event_bus,
        "toggled",
        &BulkToggle {
            role,
            scope: "row",
            target: Some(node.path.visibility_key()),
            result,
        },
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(ToggleResponse { role, result }))
}

// =============================================================================
// ROLE LEVEL
// =============================================================================

/// Clear every grant and visibility flag of a role
#[utoipa::path(
    post,
    path = "/rbac/roles/{role}/reset",
    tag = "RBAC",
    params(
        ("role" = String, Path, description = "Role name"),
    ),
    responses(
        (status = 200, description = "Role cleared", body = RoleSummary),
        (status = 400, description = "Unknown role"),
    )
)]
pub async fn reset_role(
    State(state): State<AppState>,
    Path(role): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<RoleSummary>> {
    let role = parse_role(&role)?;
    state.store.write().await.reset_role(role);

    log_activity(
        &state.event_bus,
        "reset",
        &RoleChange { role, source: None },
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(RoleSummary {
        role,
        label: role.label().to_string(),
        granted: 0,
        visible: 0,
    }))
}

/// Replace a role's grants and visibility with another role's
#[utoipa::path(
    post,
    path = "/rbac/roles/{role}/copy-from/{source}",
    tag = "RBAC",
    params(
        ("role" = String, Path, description = "Role to overwrite"),
        ("source" = String, Path, description = "Role to copy from"),
    ),
    responses(
        (status = 200, description = "Role copied", body = RoleSummary),
        (status = 400, description = "Unknown role"),
        (status = 409, description = "Source and target are the same role"),
    )
)]
pub async fn copy_role(
    State(state): State<AppState>,
    Path((role, source)): Path<(String, String)>,
    headers: HeaderMap,
) -> AppResult<Json<RoleSummary>> {
    let role = parse_role(&role)?;
    let source = parse_role(&source)?;
    if role == source {
        return Err(AppError::conflict("cannot copy a role onto itself"));
    }

    let mut store = state.store.write().await;
    store.copy_role(source, role);
    let summary = RoleSummary {
        role,
        label: role.label().to_string(),
        granted: store.granted(role).len(),
        visible: store
            .hierarchy()
            .paths()
            .filter(|path| store.visibility(role, path))
            .count(),
    };
    drop(store);

    log_activity(
        &state.event_bus,
        "copied",
        &RoleChange {
            role,
            source: Some(source),
        },
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(summary))
}
