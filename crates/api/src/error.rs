//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DocumentError;
use order_service::ServiceError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Error raised by the order service.
    Service(ServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Service(err) => service_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn service_error_to_response(err: ServiceError) -> (StatusCode, String) {
    match &err {
        ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ServiceError::Conflict { .. } => (StatusCode::CONFLICT, err.to_string()),
        ServiceError::Store(store_err) => {
            tracing::error!(error = %store_err, "order store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use domain::{OrderId, ValidationError, Version};

    use super::*;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_service_errors_map_to_statuses() {
        let id = OrderId::new();
        let cases = [
            (
                ApiError::Service(ServiceError::NotFound(id)),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Service(ServiceError::Conflict {
                    order_id: id,
                    expected: Version::first(),
                    actual: Version::new(2),
                }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Service(ValidationError::EmptyLineItems.into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::BadRequest("Invalid ID format".to_string()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, expected) in cases {
            let (status, body) = render(err).await;
            assert_eq!(status, expected);
            assert!(body["error"].as_str().is_some_and(|msg| !msg.is_empty()));
        }
    }
}
