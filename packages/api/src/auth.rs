// ABOUTME: Bearer token authentication for write endpoints
// ABOUTME: Tokens are compared in constant time; with no tokens configured the API is open

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, Method},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Accepted API tokens
#[derive(Debug, Clone, Default)]
pub struct ApiTokens {
    tokens: Vec<String>,
}

impl ApiTokens {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.is_empty())
                .collect(),
        }
    }

    /// No tokens configured: every request is let through
    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// Check a presented token against every configured one without
    /// short-circuiting on the first match.
    pub fn verify(&self, presented: &str) -> bool {
        let presented = presented.as_bytes();
        self.tokens
            .iter()
            .fold(0u8, |matched, token| {
                matched | token.as_bytes().ct_eq(presented).unwrap_u8()
            })
            == 1
    }
}

/// Writes under /api need a token; reads and service info stay public
fn requires_authentication(method: &Method, path: &str) -> bool {
    let is_write = !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS);
    is_write && path.starts_with("/api/")
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
}

/// Bearer token validation middleware
pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path();

    if !state.tokens.is_enabled() || !requires_authentication(request.method(), path) {
        return Ok(next.run(request).await);
    }

    let token = match bearer_token(&request) {
        Some(token) => token,
        None => {
            warn!(path = %path, "Missing bearer token");
            return Err(ApiError::unauthorized(
                "API token required. Please include an Authorization: Bearer header.",
            ));
        }
    };

    if !state.tokens.verify(token) {
        warn!(path = %path, "Invalid API token provided");
        return Err(ApiError::unauthorized("Invalid API token"));
    }

    debug!(path = %path, "API token validated successfully");
    Ok(next.run(request).await)
}
