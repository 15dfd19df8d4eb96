use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use tracing::{error, warn};

use super::response::{ApiResponse, FORM_CONTENT_TYPE};

/// Request validation middleware; the state is the maximum body size in bytes
pub async fn request_validation_middleware(
    State(max_request_size): State<usize>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Err(rejection) = validate_request_size(&request, max_request_size as u64) {
        return rejection.into_response();
    }

    if let Err(rejection) = validate_content_type(&request) {
        return rejection.into_response();
    }

    next.run(request).await
}

fn declared_length(request: &Request<Body>) -> Option<u64> {
    request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
}

/// Requests that carry a body must declare it as JSON or a url-encoded form.
/// Body-less POSTs such as deletes are let through.
fn validate_content_type(request: &Request<Body>) -> Result<(), ApiResponse<()>> {
    let method = request.method();
    if method != Method::POST && method != Method::PUT && method != Method::PATCH {
        return Ok(());
    }

    let has_body = match declared_length(request) {
        Some(length) => length > 0,
        None => request.headers().contains_key(header::TRANSFER_ENCODING),
    };
    if !has_body {
        return Ok(());
    }

    match request.headers().get(header::CONTENT_TYPE) {
        Some(content_type) => {
            let content_type = content_type.to_str().unwrap_or("");
            if content_type.starts_with("application/json")
                || content_type.starts_with(FORM_CONTENT_TYPE)
            {
                Ok(())
            } else {
                warn!("Invalid content type: {}", content_type);
                Err(ApiResponse::failure(
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "Content-Type must be application/json or application/x-www-form-urlencoded",
                ))
            }
        }
        None => {
            warn!("Missing content type header");
            Err(ApiResponse::failure(
                StatusCode::BAD_REQUEST,
                "Content-Type header is required for requests with body",
            ))
        }
    }
}

fn validate_request_size(
    request: &Request<Body>,
    max_request_size: u64,
) -> Result<(), ApiResponse<()>> {
    match declared_length(request) {
        Some(length) if length > max_request_size => {
            error!("Request too large: {} bytes", length);
            Err(ApiResponse::failure(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!(
                    "Request size {} bytes exceeds maximum of {} bytes",
                    length, max_request_size
                ),
            ))
        }
        _ => Ok(()),
    }
}

/// Fails requests that outlive the configured timeout with a 408 envelope
pub async fn timeout_middleware(
    State(timeout): State<Duration>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    match tokio::time::timeout(timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            error!(path = %path, timeout_ms = timeout.as_millis(), "Request timed out");
            ApiResponse::failure(StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
        }
    }
}

/// Security headers middleware
pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'"),
    );

    response
}
