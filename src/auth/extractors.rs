use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::cookies::{get_cookie, ACCESS_COOKIE};
use crate::auth::jwt::JwtKeys;
use crate::auth::repo_types::{PublicUser, User};
use crate::error::ApiError;
use crate::state::AppState;

/// Identity gate: resolves a bearer credential to a credential-stripped user.
///
/// Every failure mode (missing token, bad token, deleted user) is reported as
/// the same generic rejection so callers cannot tell which check failed.
pub struct AuthUser(pub PublicUser);

/// Optional variant for routes where identity only enriches the response.
pub struct MaybeAuthUser(pub Option<PublicUser>);

/// Bearer value from the `accessToken` cookie or `Authorization` header;
/// the cookie takes precedence.
fn token_from_parts(parts: &Parts) -> Option<String> {
    if let Some(token) = get_cookie(&parts.headers, ACCESS_COOKIE) {
        return Some(token);
    }
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

fn unauthorized() -> ApiError {
    ApiError::unauthorized("Unauthorized access")
}

async fn resolve_identity(parts: &Parts, state: &AppState) -> Result<PublicUser, ApiError> {
    let token = token_from_parts(parts).ok_or_else(unauthorized)?;

    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify_access(&token).map_err(|_| {
        warn!("invalid or expired access token");
        unauthorized()
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await
        .map_err(|e| {
            warn!(error = %e, "identity lookup failed");
            unauthorized()
        })?
        .ok_or_else(unauthorized)?;

    Ok(PublicUser::from(user))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_identity(parts, state).await.map(AuthUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(resolve_identity(parts, state).await.ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn parts_with_headers(builder: axum::http::request::Builder) -> Parts {
        builder.body(Body::empty()).unwrap().into_parts().0
    }

    #[test]
    fn cookie_takes_precedence_over_header() {
        let parts = parts_with_headers(
            Request::builder()
                .header("cookie", "accessToken=from-cookie")
                .header("authorization", "Bearer from-header"),
        );
        assert_eq!(token_from_parts(&parts).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn falls_back_to_bearer_header() {
        let parts =
            parts_with_headers(Request::builder().header("authorization", "Bearer the-token"));
        assert_eq!(token_from_parts(&parts).as_deref(), Some("the-token"));
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        let parts =
            parts_with_headers(Request::builder().header("authorization", "Basic dXNlcjpwdw=="));
        assert!(token_from_parts(&parts).is_none());
    }

    #[test]
    fn no_credential_yields_none() {
        let parts = parts_with_headers(Request::builder());
        assert!(token_from_parts(&parts).is_none());
    }

    #[tokio::test]
    async fn gate_rejects_missing_token() {
        let state = AppState::fake();
        let mut parts = parts_with_headers(Request::builder());
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn gate_rejects_malformed_token() {
        let state = AppState::fake();
        let mut parts = parts_with_headers(
            Request::builder().header("authorization", "Bearer not.a.jwt"),
        );
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn optional_gate_never_rejects() {
        let state = AppState::fake();
        let mut parts = parts_with_headers(
            Request::builder().header("authorization", "Bearer not.a.jwt"),
        );
        let MaybeAuthUser(identity) = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("infallible");
        assert!(identity.is_none());
    }
}
