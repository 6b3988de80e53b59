use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use log::{error, warn};
use serde::Serialize;

use super::state::AppState;
use super::{api_error, ApiError};
use crate::importer::Importer;

const FILE_FIELD: &str = "file";

/// Response structure for a processed upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub transactions_imported: usize,
    pub subscriptions_detected: usize,
}

/// POST /api/upload
/// Imports a CSV of transactions from the multipart field `file`, then
/// recomputes subscription candidates
pub async fn upload_csv(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        warn!("Upload rejected: {}", e);
        api_error(StatusCode::BAD_REQUEST, "No file uploaded")
    })?;

    let Some(contents) = read_file_field(&mut multipart).await? else {
        return Err(api_error(StatusCode::BAD_REQUEST, "No file uploaded"));
    };

    let db = state.db.clone();
    let summary = tokio::task::spawn_blocking(move || Importer::import_csv(&db, &contents[..]))
        .await
        .map_err(|e| {
            error!("CSV import task failed: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process CSV file",
            )
        })?
        .map_err(|e| {
            error!("Error processing CSV: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process CSV file",
            )
        })?;

    Ok(Json(UploadResponse {
        success: true,
        transactions_imported: summary.transactions_imported,
        subscriptions_detected: summary.subscriptions_detected,
    }))
}

/// Returns the contents of the first `file` field; other fields are skipped.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<Bytes>, ApiError> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, "Invalid multipart upload"))?;

        let Some(field) = field else {
            return Ok(None);
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let contents = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, "Failed to read uploaded file"))?;

        return Ok(Some(contents));
    }
}

/// Hitting the configured body limit surfaces as a multipart error with 413.
fn multipart_error(e: MultipartError, message: &str) -> ApiError {
    let status = e.status();
    warn!("{}: {}", message, e);

    if status == StatusCode::PAYLOAD_TOO_LARGE {
        api_error(status, "Uploaded file is too large")
    } else {
        api_error(status, message)
    }
}
