use async_trait::async_trait;
use axum::{
    extract::{Query, RawPathParams, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::handlers::ApiResponse;
use crate::observability::Metrics;

/// Name of the path and query parameter carrying the token
pub const AUTH_TOKEN_PARAM: &str = "authToken";

/// Header carrying the token. Header names are matched case-insensitively.
pub const AUTH_TOKEN_HEADER: &str = "authtoken";

/// Token accepted when none is configured
pub const DEFAULT_AUTH_TOKEN: &str = "Admin";

/// Identity attached to an authenticated request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub full_name: String,
    pub user_id: String,
}

impl Principal {
    pub fn admin() -> Self {
        Self {
            full_name: "Admin".to_string(),
            user_id: "Admin".to_string(),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication Token is missing in Request")]
    Missing,

    #[error("Incorrect Authentication Token")]
    Incorrect,
}

impl AuthError {
    /// Metric label for the failure
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Missing => "missing",
            AuthError::Incorrect => "incorrect",
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: Option<&str>) -> Result<Principal, AuthError>;
}

/// Accepts exactly one literal token and maps it to the admin principal
pub struct StaticTokenAuthenticator {
    token: String,
}

impl StaticTokenAuthenticator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Default for StaticTokenAuthenticator {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_TOKEN)
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, token: Option<&str>) -> Result<Principal, AuthError> {
        match token {
            None => Err(AuthError::Missing),
            Some(token) if token == self.token => Ok(Principal::admin()),
            Some(_) => Err(AuthError::Incorrect),
        }
    }
}

/// State shared by the auth middleware
#[derive(Clone)]
pub struct AuthState {
    authenticator: Arc<dyn Authenticator>,
    metrics: Option<Arc<Metrics>>,
}

impl AuthState {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Every non-empty token carried by the request, in lookup order: path
/// parameter, query string, header.
pub fn extract_tokens(path_params: Option<&RawPathParams>, request: &Request) -> Vec<String> {
    let from_path = path_params.and_then(|params| {
        params
            .iter()
            .find(|(name, _)| *name == AUTH_TOKEN_PARAM)
            .map(|(_, value)| value.to_string())
    });

    let from_query = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove(AUTH_TOKEN_PARAM));

    let from_header = request
        .headers()
        .get(AUTH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    [from_path, from_query, from_header]
        .into_iter()
        .flatten()
        .filter(|token| !token.is_empty())
        .collect()
}

/// Succeeds if any supplied token is accepted. With no tokens the request is
/// reported as missing one, otherwise the first token's failure is returned.
async fn authenticate_any(
    authenticator: &dyn Authenticator,
    tokens: &[String],
) -> Result<Principal, AuthError> {
    let mut first_failure = None;
    for token in tokens {
        match authenticator.authenticate(Some(token.as_str())).await {
            Ok(principal) => return Ok(principal),
            Err(e) => {
                first_failure.get_or_insert(e);
            }
        }
    }

    match first_failure {
        Some(e) => Err(e),
        None => authenticator.authenticate(None).await,
    }
}

/// Rejects requests without a valid token with a 403 envelope and attaches
/// the authenticated [`Principal`] to the request extensions otherwise.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    path_params: Option<RawPathParams>,
    mut request: Request,
    next: Next,
) -> Response {
    let tokens = extract_tokens(path_params.as_ref(), &request);

    match authenticate_any(auth.authenticator.as_ref(), &tokens).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(e) => {
            crate::warn_with_trace!(
                reason = e.reason(),
                method = %request.method(),
                path = %request.uri().path(),
                "{}",
                e
            );
            if let Some(metrics) = &auth.metrics {
                metrics.record_auth_failure(e.reason());
            }
            ApiResponse::failure(StatusCode::FORBIDDEN, e.to_string()).into_response()
        }
    }
}
