use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use log::{error, info};

use super::state::AppState;
use super::{api_error, ApiError, SuccessResponse};
use crate::error::SubtrackError;
use crate::subscriptions::{Subscription, Subscriptions};

/// GET /api/subscriptions
/// Returns every subscription candidate, most recently charged first
pub async fn list_subscriptions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    let subscriptions = Subscriptions::list_all(&state.db).map_err(|e| {
        error!("Error fetching subscriptions: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch subscriptions",
        )
    })?;

    Ok(Json(subscriptions))
}

/// POST /api/subscriptions/{id}/false-positive
/// Marks a subscription as a false positive, which also deactivates it
pub async fn mark_false_positive(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    Subscriptions::mark_false_positive(&state.db, id).map_err(|e| status_error(id, e))?;
    info!("Marked subscription {} as false positive", id);

    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/subscriptions/{id}/inactive
/// Marks a subscription as no longer active
pub async fn mark_inactive(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    Subscriptions::mark_inactive(&state.db, id).map_err(|e| status_error(id, e))?;
    info!("Marked subscription {} as inactive", id);

    Ok(Json(SuccessResponse { success: true }))
}

fn status_error(id: i64, e: SubtrackError) -> ApiError {
    match e {
        SubtrackError::NotFound(_) => api_error(
            StatusCode::NOT_FOUND,
            &format!("Subscription with id {} not found", id),
        ),
        _ => {
            error!("Error updating subscription {}: {}", id, e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update subscription",
            )
        }
    }
}
