//! API error types with HTTP response mapping.

use axum::extract::FromRequest;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, FieldError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid bearer token.
    Unauthorized(String),
    /// Authenticated, but not allowed.
    Forbidden(String),
    /// Malformed request body.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

/// Status, error kind, message and per-field details of an error response.
type ErrorParts = (StatusCode, &'static str, String, Option<Vec<FieldError>>);

impl ApiError {
    fn parts(self) -> ErrorParts {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg, None)
            }
            ApiError::Domain(err) => domain_error_parts(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                internal()
            }
        }
    }
}

fn internal() -> ErrorParts {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "Internal server error".to_string(),
        None,
    )
}

fn domain_error_parts(err: DomainError) -> ErrorParts {
    let kind = err.kind();
    let message = err.to_string();
    match err {
        DomainError::Validation(fields) => (StatusCode::BAD_REQUEST, kind, message, Some(fields)),
        DomainError::EmptyCart => (StatusCode::BAD_REQUEST, kind, message, None),
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, kind, message, None),
        DomainError::InsufficientStock { .. } | DomainError::InvalidTransition { .. } => {
            (StatusCode::CONFLICT, kind, message, None)
        }
        DomainError::Store(store_err) => {
            tracing::error!(error = %store_err, "store failure");
            internal()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message, fields) = self.parts();
        metrics::counter!("api_errors_total", "kind" => kind).increment(1);

        let mut body = serde_json::json!({ "kind": kind, "error": message });
        if let Some(fields) = fields {
            body["fields"] = serde_json::json!(fields);
        }
        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// JSON body extractor whose rejections use the API error format.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: axum::extract::Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}
