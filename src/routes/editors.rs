//! Staged "Configure" dialog sessions
//!
//! A session copies the popup-level grants of one node. Toggles only touch
//! the copy; save commits it in a single store write, cancel drops it.
//! Sessions left open longer than the editor TTL are evicted when another
//! editor is opened.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, EventBus, RequestContext};
use crate::models::rbac::*;
use crate::rbac::{Action, NodePath, PermissionId, StagedEdit, ToggleOutcome};

use super::rbac::{parse_action, parse_role, resolve_node};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/editors", post(open_editor))
        .route("/editors/:id", get(get_editor).delete(cancel_editor))
        .route("/editors/:id/toggle", post(toggle_in_editor))
        .route("/editors/:id/toggle-group", post(toggle_group_in_editor))
        .route("/editors/:id/save", post(save_editor))
}

fn editor_view(id: Uuid, edit: &StagedEdit) -> EditorResponse {
    EditorResponse {
        id,
        role: edit.role(),
        parent: edit.parent().visibility_key(),
        dirty: edit.is_dirty(),
        rows: edit.rows(),
    }
}

fn editor_not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("editor {id}"))
}

/// Drops editors opened more than `ttl` ago and publishes one event per session.
fn evict_stale_editors(
    editors: &mut HashMap<Uuid, StagedEdit>,
    ttl: Duration,
    event_bus: &EventBus,
    context: &RequestContext,
) {
    let now = Utc::now();
    let stale: Vec<Uuid> = editors
        .iter()
        .filter(|(_, edit)| now - edit.opened_at() >= ttl)
        .map(|(id, _)| *id)
        .collect();

    for id in &stale {
        if let Some(edit) = editors.remove(id) {
            log_activity(
                event_bus,
                "expired",
                &EditorChange {
                    id: *id,
                    role: edit.role(),
                    parent: edit.parent().visibility_key(),
                    target: None,
                    outcome: None,
                },
                Some(context.clone()),
            );
        }
    }
    if !stale.is_empty() {
        tracing::info!(evicted = stale.len(), "stale editors evicted");
    }
}

/// Open a staged editor for the children of one node
#[utoipa::path(
    post,
    path = "/rbac/editors",
    tag = "Editors",
    request_body = OpenEditorRequest,
    responses(
        (status = 201, description = "Editor opened", body = EditorResponse),
        (status = 400, description = "Unknown role"),
        (status = 404, description = "Node not found"),
    )
)]
pub async fn open_editor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OpenEditorRequest>,
) -> AppResult<(StatusCode, Json<EditorResponse>)> {
    let role = parse_role(&req.role)?;
    let edit = {
        let store = state.store.read().await;
        let node = resolve_node(&store, &req.path)?;
        StagedEdit::open(&store, role, &node.path)?
    };

    let id = Uuid::new_v4();
    let view = editor_view(id, &edit);
    let context = RequestContext::from_headers(&headers);
    {
        let mut editors = state.editors.write().await;
        evict_stale_editors(&mut editors, state.editor_ttl, &state.event_bus, &context);
        editors.insert(id, edit);
    }

    log_activity(
        &state.event_bus,
        "opened",
        &EditorChange {
            id,
            role,
            parent: view.parent.clone(),
            target: None,
            outcome: None,
        },
        Some(context),
    );

    Ok((StatusCode::CREATED, Json(view)))
}

/// Staged rows of an open editor, with visibility re-read from the store
#[utoipa::path(
    get,
    path = "/rbac/editors/{id}",
    tag = "Editors",
    params(
        ("id" = Uuid, Path, description = "Editor session ID"),
    ),
    responses(
        (status = 200, description = "Editor state", body = EditorResponse),
        (status = 404, description = "Editor not found"),
    )
)]
pub async fn get_editor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EditorResponse>> {
    let store = state.store.read().await;
    let mut editors = state.editors.write().await;
    let edit = editors.get_mut(&id).ok_or_else(|| editor_not_found(id))?;
    edit.refresh(&store);

    Ok(Json(editor_view(id, edit)))
}

/// Flip one staged checkbox; hidden nodes are ignored
#[utoipa::path(
    post,
    path = "/rbac/editors/{id}/toggle",
    tag = "Editors",
    params(
        ("id" = Uuid, Path, description = "Editor session ID"),
    ),
    request_body = EditorToggleRequest,
    responses(
        (status = 200, description = "Editor state", body = EditorToggleResponse),
        (status = 400, description = "Malformed path or unknown action"),
        (status = 404, description = "Editor not found"),
    )
)]
pub async fn toggle_in_editor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<EditorToggleRequest>,
) -> AppResult<Json<EditorToggleResponse>> {
    let path: NodePath = req.path.parse()?;
    let action = parse_action(&req.action)?;

    let store = state.store.read().await;
    let mut editors = state.editors.write().await;
    let edit = editors.get_mut(&id).ok_or_else(|| editor_not_found(id))?;
    edit.refresh(&store);
    let applied = edit.toggle(&path, action);
    let view = editor_view(id, edit);
    drop(editors);
    drop(store);

    if applied {
        log_activity(
            &state.event_bus,
            "staged",
            &EditorChange {
                id,
                role: view.role,
                parent: view.parent.clone(),
                target: Some(PermissionId::new(path, action).to_string()),
                outcome: None,
            },
            Some(RequestContext::from_headers(&headers)),
        );
    }

    Ok(Json(EditorToggleResponse { applied, editor: view }))
}

/// All-or-nothing toggle over the visible children for the given actions
#[utoipa::path(
    post,
    path = "/rbac/editors/{id}/toggle-group",
    tag = "Editors",
    params(
        ("id" = Uuid, Path, description = "Editor session ID"),
    ),
    request_body = EditorGroupRequest,
    responses(
        (status = 200, description = "Editor state", body = EditorResponse),
        (status = 400, description = "Unknown action"),
        (status = 404, description = "Editor not found"),
    )
)]
pub async fn toggle_group_in_editor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<EditorGroupRequest>,
) -> AppResult<Json<EditorResponse>> {
    let actions = if req.actions.is_empty() {
        Action::ALL.to_vec()
    } else {
        req.actions
            .iter()
            .map(|raw| parse_action(raw))
            .collect::<AppResult<Vec<_>>>()?
    };

    let store = state.store.read().await;
    let mut editors = state.editors.write().await;
    let edit = editors.get_mut(&id).ok_or_else(|| editor_not_found(id))?;
    edit.refresh(&store);
    let result = edit.toggle_nested_group(&actions);
    let view = editor_view(id, edit);
    drop(editors);
    drop(store);

    if result.outcome != ToggleOutcome::Skipped {
        let names: Vec<&str> = actions.iter().map(|action| action.as_str()).collect();
        log_activity(
            &state.event_bus,
            "staged",
            &EditorChange {
                id,
                role: view.role,
                parent: view.parent.clone(),
                target: Some(format!("{}#{}", view.parent, names.join(","))),
                outcome: None,
            },
            Some(RequestContext::from_headers(&headers)),
        );
    }

    Ok(Json(view))
}

/// Commit the staged changes and close the editor
#[utoipa::path(
    post,
    path = "/rbac/editors/{id}/save",
    tag = "Editors",
    params(
        ("id" = Uuid, Path, description = "Editor session ID"),
    ),
    responses(
        (status = 200, description = "Save result", body = SaveResponse),
        (status = 404, description = "Editor not found"),
    )
)]
pub async fn save_editor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<SaveResponse>> {
    let edit = state
        .editors
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| editor_not_found(id))?;
    let role = edit.role();
    let parent = edit.parent().visibility_key();

    let outcome = {
        let mut store = state.store.write().await;
        edit.save(&mut store)
    };

    let response = SaveResponse::new(id, &outcome);
    log_activity(
        &state.event_bus,
        "saved",
        &EditorChange {
            id,
            role,
            parent,
            target: None,
            outcome: Some(outcome),
        },
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(response))
}

/// Discard the staged changes
#[utoipa::path(
    delete,
    path = "/rbac/editors/{id}",
    tag = "Editors",
    params(
        ("id" = Uuid, Path, description = "Editor session ID"),
    ),
    responses(
        (status = 204, description = "Editor discarded"),
        (status = 404, description = "Editor not found"),
    )
)]
pub async fn cancel_editor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let edit = state
        .editors
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| editor_not_found(id))?;

    log_activity(
        &state.event_bus,
        "cancelled",
        &EditorChange {
            id,
            role: edit.role(),
            parent: edit.parent().visibility_key(),
            target: None,
            outcome: None,
        },
        Some(RequestContext::from_headers(&headers)),
    );
    edit.cancel();

    Ok(StatusCode::NO_CONTENT)
}
