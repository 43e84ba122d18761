//! API handlers for the oracle server.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::contract::OpenInsureApp;
use crate::eth::Address;
use crate::models::ApiResponse;
use crate::services::status_tally::StatusCount;

/// Read accessor over the in-memory status tally.
pub async fn get_tally(State(state): State<AppState>) -> Json<ApiResponse<Vec<StatusCount>>> {
    Json(ApiResponse::ok(state.tally.snapshot()))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequestBody {
    pub airline: Address,
    pub flight: String,
    /// Defaults to the current unix time.
    pub timestamp: Option<u64>,
}

/// Asks the contract to open a flight status request; registered oracles
/// (including this daemon's accounts) answer it.
pub async fn request_flight_status(
    State(state): State<AppState>,
    Json(body): Json<StatusRequestBody>,
) -> (StatusCode, Json<ApiResponse<String>>) {
    let Some(contract) = state.contract else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::err("no contract address configured")),
        );
    };

    let owner = match state.rpc.accounts().await {
        Ok(accounts) if !accounts.is_empty() => accounts[0],
        Ok(_) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::err("node exposes no accounts")),
            )
        }
        Err(error) => {
            warn!(error = %error, "account enumeration failed");
            return (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::err(error.to_string())),
            );
        }
    };

    let timestamp = body.timestamp.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    });

    match contract
        .fetch_flight_status(owner, body.airline, &body.flight, timestamp)
        .await
    {
        Ok(tx_hash) => {
            info!(flight = %body.flight, tx_hash = %tx_hash, "flight status request submitted");
            (StatusCode::OK, Json(ApiResponse::ok(tx_hash)))
        }
        Err(error) => {
            warn!(flight = %body.flight, error = %error, "flight status request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::err(error.to_string())),
            )
        }
    }
}
