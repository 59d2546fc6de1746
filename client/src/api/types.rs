//! REST API request and response bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{JobError, ServerError, WalletError};
use crate::models::JobSubmission;
use crate::orchestrator::JobPhase;
use crate::status::{Snackbar, StatusState};
use crate::view::SubmitControl;
use crate::wallet::WalletState;

/// Body of `POST /api/jobs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub artist_id: String,
    pub prompt: String,
}

/// Answer to an accepted job: it runs in the background, follow
/// `/api/status/stream` for progress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub status: &'static str,
    pub artist_id: String,
    pub prompt: String,
}

/// Everything a status panel needs in one read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: StatusState,
    pub snackbar: Snackbar,
    pub wallet: WalletState,
    pub phase: JobPhase,
    pub submit: SubmitControl,
    /// Latest submission of this session
    pub submission: Option<JobSubmission>,
}

/// Image URLs of one job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagesResponse {
    pub job_id: u64,
    pub images: Vec<String>,
}

/// Error body.
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

impl ServerError {
    /// HTTP status a handler answers with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Job(JobError::JobInFlight) => StatusCode::CONFLICT,
            ServerError::Job(JobError::EnvironmentUnavailable)
            | ServerError::Wallet(WalletError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Job(_)
            | ServerError::Wallet(_)
            | ServerError::Contract(_)
            | ServerError::Image(_) => StatusCode::BAD_GATEWAY,
            ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::warn!("Request failed: {}", self);
        }
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContractError;

    #[test]
    fn test_server_error_status_codes() {
        let cases = [
            (ServerError::BadRequest("Prompt is empty".into()), StatusCode::BAD_REQUEST),
            (ServerError::Job(JobError::JobInFlight), StatusCode::CONFLICT),
            (
                ServerError::Job(JobError::EnvironmentUnavailable),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ServerError::Job(JobError::ConnectionFailure), StatusCode::BAD_GATEWAY),
            (ServerError::Wallet(WalletError::Unavailable), StatusCode::SERVICE_UNAVAILABLE),
            (ServerError::Wallet(WalletError::NoAccounts), StatusCode::BAD_GATEWAY),
            (ServerError::Contract(ContractError::Unavailable), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err);
        }
    }

    #[tokio::test]
    async fn test_server_error_body() {
        let response = ServerError::Job(JobError::JobInFlight).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, error_response("A job is already in progress"));
    }
}
