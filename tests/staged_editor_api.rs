use std::sync::Arc;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::util::ServiceExt;

use erp_rbac::app::{router, AppState};
use erp_rbac::create_app_with_store;
use erp_rbac::events::init_event_bus;
use erp_rbac::rbac::{Action, Hierarchy, NodePath, PermissionStore, Role};

const RECORD: &str = "hrms:attendance:attendance record";
const SHIFTS: &str = "hrms:attendance:shift schedule";

/// Manager sees both Attendance popups and already holds View on the shift schedule.
fn store() -> Result<PermissionStore> {
    let mut store = PermissionStore::new(Arc::new(Hierarchy::erp_default()));
    let record: NodePath = RECORD.parse()?;
    let shifts: NodePath = SHIFTS.parse()?;
    store.set_visibility(Role::Manager, &record, true);
    store.set_visibility(Role::Manager, &shifts, true);
    store.set_permission(Role::Manager, &shifts, Action::View, true);
    Ok(store)
}

fn app() -> Result<Router> {
    Ok(create_app_with_store(store()?))
}

/// Router whose activity bus stays with the caller, for asserting on events.
fn app_with_events(editor_ttl: Duration) -> Result<(Router, broadcast::Receiver<Value>)> {
    let (event_bus, rx) = init_event_bus();
    let state = AppState::new(store()?, event_bus).with_editor_ttl(editor_ttl);
    Ok((router(state), rx))
}

fn drain(rx: &mut broadcast::Receiver<Value>) -> Vec<Value> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

async fn open(app: &Router, role: &str, path: &str) -> Result<String> {
    let (status, body) = send(app, "POST", "/rbac/editors", Some(json!({"role": role, "path": path}))).await?;
    assert_eq!(status, StatusCode::CREATED, "open failed: {}", body);
    Ok(body["id"].as_str().expect("editor id").to_string())
}

async fn permissions(app: &Router, role: &str) -> Result<Value> {
    let (_, body) = send(app, "GET", &format!("/rbac/roles/{role}/permissions"), None).await?;
    Ok(body["permissions"].clone())
}

#[tokio::test]
async fn opened_editor_lists_direct_children() -> Result<()> {
    let app = app()?;
    let (status, body) = send(
        &app,
        "POST",
        "/rbac/editors",
        Some(json!({"role": "manager", "path": "HRMS:Attendance"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["parent"], "hrms:attendance");
    assert_eq!(body["dirty"], false);

    let rows = body["rows"].as_array().expect("rows");
    let keys: Vec<&str> = rows.iter().filter_map(|row| row["key"].as_str()).collect();
    assert_eq!(keys, vec![RECORD, SHIFTS]);
    assert_eq!(rows[1]["actions"][0]["granted"], true);

    Ok(())
}

#[tokio::test]
async fn cancel_leaves_the_store_untouched() -> Result<()> {
    let app = app()?;
    let before = permissions(&app, "manager").await?;
    let id = open(&app, "manager", "hrms:attendance").await?;

    let (_, body) = send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle"),
        Some(json!({"path": RECORD, "action": "edit"})),
    )
    .await?;
    assert_eq!(body["applied"], true);
    assert_eq!(body["dirty"], true);

    send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle"),
        Some(json!({"path": SHIFTS, "action": "view"})),
    )
    .await?;

    // staged changes are not visible through the store
    assert_eq!(permissions(&app, "manager").await?, before);

    let (status, _) = send(&app, "DELETE", &format!("/rbac/editors/{id}"), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(permissions(&app, "manager").await?, before);

    let (status, _) = send(&app, "GET", &format!("/rbac/editors/{id}"), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn save_commits_the_staged_diff() -> Result<()> {
    let app = app()?;
    let id = open(&app, "manager", "hrms:attendance").await?;

    send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle"),
        Some(json!({"path": RECORD, "action": "edit"})),
    )
    .await?;
    send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle"),
        Some(json!({"path": SHIFTS, "action": "view"})),
    )
    .await?;

    let (status, body) = send(&app, "POST", &format!("/rbac/editors/{id}/save"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "committed");
    assert_eq!(body["granted"], json!(["hrms/attendance/attendance record#edit"]));
    assert_eq!(body["revoked"], json!(["hrms/attendance/shift schedule#view"]));

    assert_eq!(
        permissions(&app, "manager").await?,
        json!(["hrms/attendance/attendance record#edit"])
    );

    // the session is closed after save
    let (status, _) = send(&app, "POST", &format!("/rbac/editors/{id}/save"), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn save_without_changes_is_unchanged() -> Result<()> {
    let app = app()?;
    let id = open(&app, "manager", "hrms:attendance").await?;

    // toggling twice returns to the baseline
    for _ in 0..2 {
        send(
            &app,
            "POST",
            &format!("/rbac/editors/{id}/toggle"),
            Some(json!({"path": RECORD, "action": "create"})),
        )
        .await?;
    }

    let (status, body) = send(&app, "POST", &format!("/rbac/editors/{id}/save"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unchanged");
    assert_eq!(body["granted"], json!([]));

    Ok(())
}

#[tokio::test]
async fn hidden_children_are_disabled_in_the_editor() -> Result<()> {
    let app = app()?;
    // Employee has no visibility on anything
    let id = open(&app, "employee", "sales:invoices").await?;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle"),
        Some(json!({"path": "sales:invoices:credit notes", "action": "view"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], false);
    assert_eq!(body["dirty"], false);

    // a path outside the editor's scope is ignored the same way
    let (_, body) = send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle"),
        Some(json!({"path": "crm:leads", "action": "view"})),
    )
    .await?;
    assert_eq!(body["applied"], false);

    Ok(())
}

#[tokio::test]
async fn group_toggle_is_all_or_nothing() -> Result<()> {
    let app = app()?;
    let id = open(&app, "manager", "hrms:attendance").await?;

    // View is partially held, so the first toggle grants it on both children
    let (status, body) = send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle-group"),
        Some(json!({"actions": ["view"]})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let rows = body["rows"].as_array().expect("rows");
    assert!(rows.iter().all(|row| row["actions"][0]["granted"] == true));

    let (_, body) = send(&app, "POST", &format!("/rbac/editors/{id}/toggle-group"), Some(json!({}))).await?;
    let rows = body["rows"].as_array().expect("rows");
    assert!(rows
        .iter()
        .all(|row| row["actions"].as_array().unwrap().iter().all(|cell| cell["granted"] == true)));

    let (_, body) = send(&app, "POST", &format!("/rbac/editors/{id}/save"), None).await?;
    assert_eq!(body["granted"].as_array().unwrap().len(), 7);

    Ok(())
}

#[tokio::test]
async fn editor_errors() -> Result<()> {
    let app = app()?;

    let (status, _) = send(
        &app,
        "POST",
        "/rbac/editors",
        Some(json!({"role": "manager", "path": "hrms:overtime"})),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/rbac/editors",
        Some(json!({"role": "guest", "path": "hrms"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let (status, body) = send(&app, "DELETE", &format!("/rbac/editors/{missing}"), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let id = open(&app, "manager", "hrms:attendance").await?;
    let (status, _) = send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle-group"),
        Some(json!({"actions": ["archive"]})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn hiding_a_popup_while_the_editor_is_open_blocks_the_grant() -> Result<()> {
    let app = app()?;
    let before = permissions(&app, "manager").await?;
    let id = open(&app, "manager", "hrms:attendance").await?;

    let (_, body) = send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle"),
        Some(json!({"path": RECORD, "action": "delete"})),
    )
    .await?;
    assert_eq!(body["applied"], true);

    let (status, _) = send(
        &app,
        "PUT",
        "/rbac/roles/manager/visibility",
        Some(json!({"path": RECORD, "visible": false})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // the editor picks up the new visibility
    let (_, body) = send(&app, "GET", &format!("/rbac/editors/{id}"), None).await?;
    assert_eq!(body["rows"][0]["visible"], false);
    assert!(body["rows"][0]["actions"]
        .as_array()
        .unwrap()
        .iter()
        .all(|cell| cell["enabled"] == false));

    let (_, body) = send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle"),
        Some(json!({"path": RECORD, "action": "edit"})),
    )
    .await?;
    assert_eq!(body["applied"], false);

    let (status, body) = send(&app, "POST", &format!("/rbac/editors/{id}/save"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unchanged");
    assert_eq!(permissions(&app, "manager").await?, before);

    Ok(())
}

#[tokio::test]
async fn stale_editors_are_evicted_when_another_opens() -> Result<()> {
    let (app, _rx) = app_with_events(Duration::zero())?;

    let first = open(&app, "manager", "hrms:attendance").await?;
    let second = open(&app, "manager", "hrms:attendance").await?;

    let (status, _) = send(&app, "GET", &format!("/rbac/editors/{first}"), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", &format!("/rbac/editors/{second}"), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (_, health) = send(&app, "GET", "/api/health", None).await?;
    assert_eq!(health["open_editors"], 1);

    Ok(())
}

#[tokio::test]
async fn fresh_editors_survive_the_sweep() -> Result<()> {
    let (app, _rx) = app_with_events(Duration::minutes(30))?;

    let first = open(&app, "manager", "hrms:attendance").await?;
    open(&app, "manager", "hrms:attendance").await?;

    let (status, _) = send(&app, "GET", &format!("/rbac/editors/{first}"), None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn staged_toggles_are_published_as_noise() -> Result<()> {
    let (app, mut rx) = app_with_events(Duration::minutes(30))?;
    let id = open(&app, "manager", "hrms:attendance").await?;

    send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle"),
        Some(json!({"path": RECORD, "action": "edit"})),
    )
    .await?;
    send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle-group"),
        Some(json!({"actions": ["view"]})),
    )
    .await?;

    let staged: Vec<Value> = drain(&mut rx)
        .into_iter()
        .filter(|event| event["name"] == "editor.staged")
        .collect();
    assert_eq!(staged.len(), 2);
    assert!(staged.iter().all(|event| event["payload"]["severity"] == "noise"));
    assert_eq!(
        staged[0]["payload"]["change"]["target"],
        "hrms/attendance/attendance record#edit"
    );
    assert_eq!(staged[1]["payload"]["change"]["target"], "hrms:attendance#view");

    // a toggle that is ignored publishes nothing
    send(
        &app,
        "POST",
        &format!("/rbac/editors/{id}/toggle"),
        Some(json!({"path": "crm:leads", "action": "view"})),
    )
    .await?;
    assert!(drain(&mut rx).is_empty());

    Ok(())
}
