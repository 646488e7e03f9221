//! HTTP trigger surface for the screener service.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::data::SymbolRequest;
use crate::ScreenerState;

/// Screening request payload.
///
/// Accepts the historical event key `sp500_data` as an alias, so recorded
/// invocation payloads replay unchanged.
#[derive(Debug, Deserialize)]
pub struct ScreenRequest {
    #[serde(alias = "sp500_data")]
    pub symbols: Vec<SymbolRequest>,
}

/// Health check endpoint.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "picks-screener",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Trigger a screening run.
pub async fn screen(
    State(state): State<Arc<ScreenerState>>,
    Json(payload): Json<ScreenRequest>,
) -> Response {
    match state.execute(payload.symbols).await {
        Ok(summary) => (StatusCode::OK, Json(json!({ "summary": summary }))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Fetch the most recent completed run.
pub async fn latest_run(State(state): State<Arc<ScreenerState>>) -> Response {
    match state.latest().await {
        Some(latest) => (StatusCode::OK, Json(latest)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No completed runs yet" })),
        )
            .into_response(),
    }
}

fn error_response(error: &picks_common::Error) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_request_accepts_both_payload_keys() {
        let modern: ScreenRequest = serde_json::from_str(
            r#"{"symbols": [{"Symbol": "AAPL", "Sector": "Information Technology"}]}"#,
        )
        .unwrap();
        assert_eq!(modern.symbols.len(), 1);

        let legacy: ScreenRequest = serde_json::from_str(
            r#"{"sp500_data": [{"Symbol": "AAPL", "Sector": "Information Technology"}]}"#,
        )
        .unwrap();
        assert_eq!(legacy.symbols[0].symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "picks-screener");
    }
}
