use axum::{extract::State, http::StatusCode, Json};
use log::error;

use super::state::AppState;
use super::{api_error, ApiError};
use crate::transactions::{Transaction, Transactions};

/// GET /api/transactions
/// Returns every stored transaction, newest first
pub async fn list_transactions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let transactions = Transactions::list_all(&state.db).map_err(|e| {
        error!("Error fetching transactions: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch transactions",
        )
    })?;

    Ok(Json(transactions))
}
