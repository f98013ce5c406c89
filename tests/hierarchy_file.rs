use std::io::Write;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::util::ServiceExt;

use erp_rbac::{create_app, AppConfig};

#[tokio::test]
async fn hierarchy_is_loaded_from_a_json_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{"modules":[
            {{"name":"Warehouse","submodules":[{{"name":"Bins","popups":["Bin Labels","Cycle Counts"]}}]}},
            {{"name":"Reports"}}
        ]}}"#
    )?;

    let config = AppConfig {
        hierarchy_path: Some(file.path().to_path_buf()),
        seed_admin: false,
        ..AppConfig::default()
    };
    let app = create_app(&config).await?;

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/rbac/hierarchy").body(Body::empty())?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let nodes: Value = serde_json::from_slice(&bytes)?;
    let keys: Vec<&str> = nodes
        .as_array()
        .expect("node list")
        .iter()
        .filter_map(|node| node["key"].as_str())
        .collect();
    assert_eq!(
        keys,
        vec![
            "warehouse",
            "warehouse:bins",
            "warehouse:bins:bin labels",
            "warehouse:bins:cycle counts",
            "reports",
        ]
    );

    // without the admin seed nobody holds anything
    let resp = app
        .oneshot(Request::builder().uri("/rbac/roles/admin/permissions").body(Body::empty())?)
        .await?;
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["permissions"], serde_json::json!([]));

    Ok(())
}

#[tokio::test]
async fn duplicate_nodes_in_the_file_are_rejected() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{"modules":[{{"name":"Sales"}},{{"name":"  sales "}}]}}"#
    )?;

    let config = AppConfig {
        hierarchy_path: Some(file.path().to_path_buf()),
        ..AppConfig::default()
    };
    assert!(create_app(&config).await.is_err());

    Ok(())
}

#[tokio::test]
async fn missing_file_is_a_configuration_error() {
    let config = AppConfig {
        hierarchy_path: Some("/nonexistent/erp-rbac/hierarchy.json".into()),
        ..AppConfig::default()
    };
    assert!(create_app(&config).await.is_err());
}
