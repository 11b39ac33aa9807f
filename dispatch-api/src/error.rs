use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dispatch_core::DispatchError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Dispatch(DispatchError),
    Anyhow(anyhow::Error),
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Anyhow(e)
    }
}

/// Maps the core taxonomy onto the operator surface status codes:
/// 400 validation, 401 auth, 404 not-found, 409 duplicate, 429
/// rate-limited, 503 carrier trouble, 500 everything else.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Dispatch(e) => {
                let status = match &e {
                    DispatchError::InvalidArgument(_) | DispatchError::ValidationError(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    DispatchError::AuthError(_) => StatusCode::UNAUTHORIZED,
                    DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
                    DispatchError::AlreadyExists(_) => StatusCode::CONFLICT,
                    DispatchError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                    DispatchError::Transient(_) | DispatchError::CarrierDegraded(_) => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    DispatchError::Configuration(_)
                    | DispatchError::Decode(_)
                    | DispatchError::Internal(_) => {
                        tracing::error!("Internal error: {}", e);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Success envelope used by every handler.
pub fn envelope<T: serde::Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "data": data,
    }))
}
