use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::rbac;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::rbac::get_hierarchy,
		routes::rbac::list_roles,
		routes::rbac::get_matrix,
		routes::rbac::list_permissions,
		routes::rbac::set_permission,
		routes::rbac::check_permission,
		routes::rbac::set_visibility,
		routes::rbac::toggle_column,
		routes::rbac::toggle_all,
		routes::rbac::toggle_row,
		routes::rbac::reset_role,
		routes::rbac::copy_role,
		routes::editors::open_editor,
		routes::editors::get_editor,
		routes::editors::toggle_in_editor,
		routes::editors::toggle_group_in_editor,
		routes::editors::save_editor,
		routes::editors::cancel_editor
	),
	components(
		schemas(
			routes::health::HealthResponse,
			rbac::Role,
			rbac::Action,
			rbac::CheckState,
			rbac::ToggleOutcome,
			rbac::ToggleResult,
			rbac::ActionCell,
			rbac::MatrixRow,
			crate::authz::Decision,
			models::rbac::NodeView,
			models::rbac::RoleSummary,
			models::rbac::ColumnView,
			models::rbac::MatrixResponse,
			models::rbac::PermissionListResponse,
			models::rbac::SetPermissionRequest,
			models::rbac::SetVisibilityRequest,
			models::rbac::NodeStatus,
			models::rbac::ToggleColumnRequest,
			models::rbac::ToggleRowRequest,
			models::rbac::ToggleResponse,
			models::rbac::CheckResponse,
			models::rbac::OpenEditorRequest,
			models::rbac::EditorResponse,
			models::rbac::EditorToggleRequest,
			models::rbac::EditorGroupRequest,
			models::rbac::EditorToggleResponse,
			models::rbac::SaveResponse
		)
	),
	tags(
		(name = "Health", description = "Service health"),
		(name = "RBAC", description = "Permission matrix and visibility"),
		(name = "Editors", description = "Staged Configure dialog sessions")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(&ApiDoc::openapi())?;

	ensure_openapi_version(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).try_it_out_enabled(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_openapi_version(doc: &mut Value) {
	if let Some(root) = doc.as_object_mut() {
		root.entry("openapi").or_insert_with(|| json!("3.0.3"));
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let Some(root) = doc.as_object_mut() else {
		return;
	};

	let has_servers = root
		.get("servers")
		.and_then(Value::as_array)
		.map(|servers| !servers.is_empty())
		.unwrap_or(false);

	if !has_servers {
		root.insert(
			"servers".to_string(),
			json!([{ "url": format!("http://localhost:{port}"), "description": "Local admin service" }]),
		);
	}
}
