//! Execution-service client.
//!
//! Thin HTTP wrapper around the external code-execution service. The core
//! treats it as an opaque, possibly-failing call: one request, one
//! response, no retry policy.

use std::time::Duration;

use events::ExecutionResult;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("execution service not configured")]
    NotConfigured,
    #[error("execution request failed: {0}")]
    Request(String),
    #[error("execution service returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("execution response parse failed: {0}")]
    Parse(String),
}

/// Client for the external execution service, configured with its base URL.
#[derive(Clone)]
pub struct ExecutionClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl ExecutionClient {
    #[must_use]
    pub fn new(base_url: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { http, base_url }
    }

    /// Read `EXECUTOR_URL` from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(std::env::var("EXECUTOR_URL").ok())
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Run a snippet against the execution service.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::NotConfigured`] when no endpoint is set,
    /// [`ExecuteError::Request`] on transport failure, and
    /// [`ExecuteError::Upstream`] on a non-success status.
    pub async fn execute(
        &self,
        code: &str,
        language: &str,
        stdin: &str,
    ) -> Result<ExecutionResult, ExecuteError> {
        let Some(base) = &self.base_url else {
            return Err(ExecuteError::NotConfigured);
        };

        let body = ExecuteRequestBody { code, language, stdin };
        let response = self
            .http
            .post(format!("{}/execute", base.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|e| ExecuteError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ExecuteError::Request(e.to_string()))?;

        if status != 200 {
            return Err(ExecuteError::Upstream { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| ExecuteError::Parse(e.to_string()))
    }
}

#[derive(serde::Serialize)]
struct ExecuteRequestBody<'a> {
    code: &'a str,
    language: &'a str,
    stdin: &'a str,
}

#[cfg(test)]
#[path = "execute_test.rs"]
mod tests;
