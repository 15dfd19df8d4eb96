use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{RepositoryError, ServiceError};

/// Envelope wrapping every API response, success or failure.
///
/// The HTTP status of the response always equals `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub error: bool,
    pub message: String,
    pub status: u16,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            error: false,
            message: message.into(),
            status: StatusCode::OK.as_u16(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            status: status.as_u16(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiResponse<()>>;

/// Map a service failure onto the envelope.
///
/// `not_found` is the message used when the operation matched nothing and
/// `failure` the one used when the store itself failed.
pub fn error_response(error: &ServiceError, not_found: &str, failure: &str) -> ApiResponse<()> {
    match error {
        ServiceError::ProductNotFound { .. }
        | ServiceError::NoProductsFound { .. }
        | ServiceError::CartNotFound { .. }
        | ServiceError::CartItemNotFound { .. } => {
            ApiResponse::failure(StatusCode::NOT_FOUND, not_found)
        }
        ServiceError::ValidationError { message } => {
            crate::warn_with_trace!(error = %message, "Request rejected");
            ApiResponse::failure(StatusCode::BAD_REQUEST, message.clone())
        }
        ServiceError::Repository { source } => {
            let status = repository_status(source);
            crate::error_with_trace!(
                error = %source,
                status = status.as_u16(),
                "{}",
                failure
            );
            ApiResponse::failure(status, failure)
        }
    }
}

fn repository_status(error: &RepositoryError) -> StatusCode {
    match error {
        RepositoryError::ConnectionFailed | RepositoryError::RateLimitExceeded => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        RepositoryError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Envelope for requests that match no route
pub async fn route_not_found() -> ApiResponse<()> {
    ApiResponse::failure(StatusCode::NOT_FOUND, "Route not found")
}

/// Optional request body as a JSON value.
///
/// An empty body yields `Value::Null`. Form-encoded bodies become an object of
/// string values. Malformed JSON is rejected with a 400 envelope instead of
/// axum's plain-text rejection.
#[derive(Debug)]
pub struct JsonBody(pub Value);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiResponse<()>;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&request) {
            let Form(fields) = Form::<Map<String, Value>>::from_request(request, state)
                .await
                .map_err(|rejection| {
                    ApiResponse::failure(StatusCode::BAD_REQUEST, rejection.body_text())
                })?;
            return Ok(JsonBody(Value::Object(fields)));
        }

        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|rejection| ApiResponse::failure(rejection.status(), rejection.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonBody(Value::Null));
        }

        serde_json::from_slice(&bytes).map(JsonBody).map_err(|e| {
            ApiResponse::failure(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e))
        })
    }
}

pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::json;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let response = ApiResponse::success("Product found", json!({"productId": "abc"}))
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "error": false,
                "message": "Product found",
                "status": 200,
                "data": {"productId": "abc"}
            })
        );
    }

    #[tokio::test]
    async fn test_failure_envelope_has_null_data() {
        let response = ApiResponse::failure(StatusCode::FORBIDDEN, "Incorrect Authentication Token")
            .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["error"], json!(true));
        assert_eq!(body["status"], json!(403));
        assert!(body["data"].is_null());
    }

    #[test]
    fn test_not_found_errors_use_caller_message() {
        let error = ServiceError::ProductNotFound {
            id: "p1".to_string(),
        };
        let response = error_response(&error, "No Product Found with given ID", "Failed");
        assert_eq!(response.status, 404);
        assert_eq!(response.message, "No Product Found with given ID");
    }

    #[test]
    fn test_validation_error_is_bad_request() {
        let error = ServiceError::ValidationError {
            message: "Product ID cannot be empty".to_string(),
        };
        let response = error_response(&error, "Not found", "Failed");
        assert_eq!(response.status, 400);
        assert_eq!(response.message, "Product ID cannot be empty");
    }

    #[test]
    fn test_repository_error_statuses() {
        let cases = [
            (RepositoryError::ConnectionFailed, 503),
            (RepositoryError::RateLimitExceeded, 503),
            (RepositoryError::Timeout, 504),
            (
                RepositoryError::AwsSdk {
                    message: "boom".to_string(),
                },
                500,
            ),
        ];

        for (source, expected) in cases {
            let error = ServiceError::from(source);
            let response = error_response(&error, "Not found", "Error Occured");
            assert_eq!(response.status, expected);
            assert!(StatusCode::from_u16(expected).unwrap().is_server_error());
            assert_eq!(response.message, "Error Occured");
        }
    }

    #[tokio::test]
    async fn test_json_body_empty_is_null() {
        let request = Request::builder().body(Body::empty()).unwrap();
        let JsonBody(value) = JsonBody::from_request(request, &()).await.unwrap();
        assert!(value.is_null());
    }

    #[tokio::test]
    async fn test_json_body_malformed_is_rejected() {
        let request = Request::builder().body(Body::from("{not json")).unwrap();
        let rejection = JsonBody::from_request(request, &()).await.unwrap_err();
        assert_eq!(rejection.status, 400);
        assert!(rejection.message.starts_with("Invalid JSON body"));
    }

    #[tokio::test]
    async fn test_form_body_becomes_object() {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=Widget&price=9.99&brand=Acme+Co"))
            .unwrap();

        let JsonBody(value) = JsonBody::from_request(request, &()).await.unwrap();
        assert_eq!(
            value,
            json!({"name": "Widget", "price": "9.99", "brand": "Acme Co"})
        );
    }
}
