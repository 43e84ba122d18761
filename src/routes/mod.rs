//! Route definitions for the oracle server API

use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;
use crate::handlers::{get_tally, request_flight_status};

pub fn oracle_routes() -> Router<AppState> {
    Router::new()
        .route("/api/tally", get(get_tally))
        .route("/api/status-requests", post(request_flight_status))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::eth::EthRpcClient;
    use crate::services::status_tally::StatusTally;

    fn app() -> Router {
        let state = AppState::new(
            Arc::new(StatusTally::new()),
            EthRpcClient::new("http://localhost:8545".to_string()),
            None,
        );
        oracle_routes().with_state(state)
    }

    #[tokio::test]
    async fn tally_starts_zeroed() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/tally")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["success"], true);
        let rows = parsed["data"].as_array().unwrap();
        assert_eq!(rows.len(), 6);
        assert!(rows.iter().all(|row| row["count"] == 0));
        assert_eq!(rows[2]["status"], 20);
    }

    #[tokio::test]
    async fn status_request_requires_a_configured_contract() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/status-requests")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"airline":"0x00000000000000000000000000000000000000aa","flight":"BAC2002"}"#,
            ))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
