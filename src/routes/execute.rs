//! Execution proxy route.
//!
//! `POST /api/execute` forwards a snippet to the external execution
//! service and relays its result. Failures are terminal for the request —
//! no retry, the client decides whether to run again.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::services::execute::ExecuteError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub stdin: String,
}

pub async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Json<events::ExecutionResult>, (StatusCode, Json<Value>)> {
    match state
        .executor
        .execute(&req.code, &req.language, &req.stdin)
        .await
    {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            warn!(error = %e, language = %req.language, "execution request failed");
            let status = match e {
                ExecuteError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            };
            Err((status, Json(json!({ "error": e.to_string() }))))
        }
    }
}
