//! Identity resolution: find a token on the request, verify it, hand the
//! caller to the handler. Fails closed — a missing token, a malformed one
//! and an expired one are indistinguishable to the client.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::token::TokenSigner;
use crate::error::ApiError;
use crate::state::AppState;

/// The verified caller, threaded by value into every protected handler.
#[derive(Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub claims: Claims,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookie_name = &state.config.token.cookie.name;
        let token = token_from_cookie(&parts.headers, cookie_name)
            .or_else(|| bearer_token(&parts.headers))
            .ok_or(ApiError::Unauthenticated)?;

        let signer = TokenSigner::from_ref(state);
        let claims = signer.verify(token).map_err(|e| {
            warn!(reason = %e, "token rejected");
            ApiError::Unauthenticated
        })?;

        Ok(AuthUser {
            id: claims.sub,
            claims,
        })
    }
}

/// Looks the token up in the `Cookie` header under `name`.
pub(crate) fn token_from_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then_some(value)
    })
}

/// Falls back to `Authorization: Bearer <token>`.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn reads_token_from_named_cookie() {
        let h = headers(&[("cookie", "theme=dark; auth_token=abc.def.ghi; lang=en")]);
        assert_eq!(token_from_cookie(&h, "auth_token"), Some("abc.def.ghi"));
    }

    #[test]
    fn ignores_other_cookies_and_empty_values() {
        let h = headers(&[("cookie", "auth_token=; other=x")]);
        assert_eq!(token_from_cookie(&h, "auth_token"), None);
        assert_eq!(token_from_cookie(&h, "missing"), None);
    }

    #[test]
    fn reads_bearer_token() {
        let h = headers(&[("authorization", "Bearer abc.def.ghi")]);
        assert_eq!(bearer_token(&h), Some("abc.def.ghi"));
        let h = headers(&[("authorization", "Basic dXNlcjpwYXNz")]);
        assert_eq!(bearer_token(&h), None);
    }

    #[tokio::test]
    async fn missing_and_invalid_tokens_reject_identically() {
        use axum::http::Request;

        let state = AppState::fake();

        let req = Request::builder().body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        let missing = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();

        let req = Request::builder()
            .header("authorization", "Bearer not.a.token")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let invalid = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();

        assert!(matches!(missing, ApiError::Unauthenticated));
        assert!(matches!(invalid, ApiError::Unauthenticated));
    }

    #[tokio::test]
    async fn valid_token_resolves_caller() {
        use axum::http::Request;

        let state = AppState::fake();
        let signer = TokenSigner::from_ref(&state);
        let user_id = Uuid::new_v4();
        let token = signer
            .issue(
                user_id,
                "Alice",
                "alice@example.com",
                crate::auth::claims::TokenKind::Access,
            )
            .unwrap();

        let req = Request::builder()
            .header("cookie", format!("auth_token={token}"))
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let user = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("resolve");
        assert_eq!(user.id, user_id);
        assert_eq!(user.claims.email, "alice@example.com");
    }
}
