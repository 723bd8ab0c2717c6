//! Bearer token middleware

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::handlers::AppState;
use crate::error::{Error, Result};

/// Verifies the bearer token and attaches the [`crate::models::Principal`]
/// to the request extensions
pub async fn require_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(request.headers())?;

    let principal = state.verifier.verify(token).map_err(|e| {
        debug!(error = %e, "Token rejected");
        Error::auth("invalid token")
    })?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| Error::auth("authorization header missing"))?;

    let invalid = || Error::auth("invalid authorization header");
    let value = value.to_str().map_err(|_| invalid())?;
    let (scheme, token) = value.trim().split_once(' ').ok_or_else(invalid)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(invalid());
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn message(result: Result<&str>) -> String {
        match result {
            Err(Error::Auth(msg)) => msg,
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn test_bearer_token_extracted() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(&headers("bearer  abc ")).unwrap(), "abc");
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(message(bearer_token(&HeaderMap::new())), "authorization header missing");
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert_eq!(message(bearer_token(&headers("Basic dXNlcg=="))), "invalid authorization header");
        assert_eq!(message(bearer_token(&headers("Bearer"))), "invalid authorization header");
        assert_eq!(message(bearer_token(&headers("Bearer   "))), "invalid authorization header");
    }
}
