use axum::{extract::State, Json};
use serde::Serialize;

use super::state::AppState;

/// Response structure for app information
#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub schema_version: String,
}

/// GET /api/app-info
///
/// Returns application name, version and database schema version
pub async fn get_app_info(State(state): State<AppState>) -> Json<AppInfo> {
    let schema_version = state
        .db
        .get_schema_version()
        .unwrap_or_else(|_| "unknown".to_string());

    Json(AppInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version,
    })
}
