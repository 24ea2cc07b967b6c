use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;

use super::{BusyError, StoreError};

#[derive(Debug, ThisError)]
pub enum PostsyncError {
    #[error(transparent)]
    Busy(#[from] BusyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for PostsyncError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            PostsyncError::Busy(busy) => {
                let status = StatusCode::CONFLICT;
                let body = ApiErrorObject {
                    code: "BUSY".to_string(),
                    message: "An ingestion cycle is already running; try again later.".to_string(),
                    details: Some(Value::String(busy.phase.to_string())),
                };
                (status, body)
            }

            PostsyncError::Store(_) => {
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                let body = ApiErrorObject {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                    details: None,
                };
                (status, body)
            }
        };
        (status, Json(ApiErrorBody { inner: error_body })).into_response()
    }
}

/// Standardized API error response payload.
#[derive(Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}
