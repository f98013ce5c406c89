use std::fs;

fn main() -> anyhow::Result<()> {
    // Same document the server serves at /api-docs/openapi.json
    let doc = erp_rbac::docs::build_openapi(8000)?;
    let s = serde_json::to_string_pretty(&doc)?;
    let path = std::env::args().nth(1).unwrap_or_else(|| "/tmp/erp-rbac-openapi.json".to_string());
    fs::write(&path, s)?;
    println!("wrote {}", path);
    Ok(())
}
