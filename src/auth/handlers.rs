use axum::{
    extract::{FromRef, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::auth::{
    claims::TokenKind,
    cookies::{clear_cookie, refresh_cookie_name, set_cookie},
    dto::{
        AuthResponse, ChangePasswordRequest, LoginRequest, PublicUser, RefreshRequest,
        RegisterRequest,
    },
    extractors::{bearer_token, token_from_cookie, AuthUser},
    password::{hash_password, verify_password},
    repo::User,
    token::TokenSigner,
};
use crate::error::ApiError;
use crate::state::AppState;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(me))
        .route("/auth/change-password", post(change_password))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Issues the access/refresh pair and the Set-Cookie headers that carry it.
fn issue_pair(state: &AppState, user: &User) -> Result<(AuthResponse, HeaderMap), ApiError> {
    let signer = TokenSigner::from_ref(state);
    let access_token = signer.issue(user.id, &user.name, &user.email, TokenKind::Access)?;
    let refresh_token = signer.issue(user.id, &user.name, &user.email, TokenKind::Refresh)?;

    let cfg = &state.config.token;
    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        set_cookie(&cfg.cookie, &cfg.cookie.name, &access_token, cfg.ttl_seconds)
            .parse()
            .map_err(anyhow::Error::from)?,
    );
    headers.append(
        header::SET_COOKIE,
        set_cookie(
            &cfg.cookie,
            &refresh_cookie_name(&cfg.cookie),
            &refresh_token,
            cfg.refresh_ttl_seconds,
        )
        .parse()
        .map_err(anyhow::Error::from)?,
    );

    Ok((
        AuthResponse {
            access_token,
            refresh_token,
            user: user.clone().into(),
        },
        headers,
    ))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.name = payload.name.trim().to_string();

    if payload.name.len() < 2 {
        return Err(ApiError::validation("Name too short"));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::conflict("Email already registered"));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.name, &payload.email, &hash).await?;

    let (body, headers) = issue_pair(&state, &user)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, headers, Json(body)))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email and wrong password are indistinguishable on purpose.
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::Unauthenticated
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthenticated);
    }

    User::touch_last_login(&state.db, user.id).await?;

    let (body, headers) = issue_pair(&state, &user)?;
    info!(user_id = %user.id, "user logged in");
    Ok((headers, Json(body)))
}

/// Clears both cookies. The tokens themselves stay valid until expiry; there
/// is no server-side revocation in this design.
#[instrument(skip(state))]
async fn logout(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<(HeaderMap, StatusCode), ApiError> {
    let cookie = &state.config.token.cookie;
    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        clear_cookie(cookie, &cookie.name)
            .parse()
            .map_err(anyhow::Error::from)?,
    );
    headers.append(
        header::SET_COOKIE,
        clear_cookie(cookie, &refresh_cookie_name(cookie))
            .parse()
            .map_err(anyhow::Error::from)?,
    );
    Ok((headers, StatusCode::NO_CONTENT))
}

#[instrument(skip(state, headers, payload))]
async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let refresh_name = refresh_cookie_name(&state.config.token.cookie);
    let body_token = payload.and_then(|Json(p)| p.refresh_token);
    let token = token_from_cookie(&headers, &refresh_name)
        .or_else(|| bearer_token(&headers))
        .map(str::to_string)
        .or(body_token)
        .ok_or(ApiError::Unauthenticated)?;

    let signer = TokenSigner::from_ref(&state);
    let claims = signer.verify(&token).map_err(|e| {
        warn!(reason = %e, "refresh token rejected");
        ApiError::Unauthenticated
    })?;

    // Re-read the user so refreshed claims pick up profile changes.
    let user = User::find(&state.db, claims.sub)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let (body, headers) = issue_pair(&state, &user)?;
    info!(user_id = %user.id, "token pair refreshed");
    Ok((headers, Json(body)))
}

#[instrument(skip(state, user))]
async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find(&state.db, user.id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, user, payload))]
async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if payload.new_password.len() < 8 {
        return Err(ApiError::validation(
            "New password must be at least 8 characters",
        ));
    }

    let record = User::find(&state.db, user.id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    if !verify_password(&payload.current_password, &record.password_hash)? {
        return Err(ApiError::validation("Current password is incorrect"));
    }

    let hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, user.id, &hash).await?;
    info!(user_id = %user.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.io"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("two@@example.com"));
    }

    #[test]
    fn auth_response_never_leaks_password_hash() {
        let user = PublicUser {
            id: uuid::Uuid::new_v4(),
            name: "Alice".into(),
            email: "alice@example.com".into(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("alice@example.com"));
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn issue_pair_sets_both_cookies() {
        let state = AppState::fake();
        let user = User {
            id: uuid::Uuid::new_v4(),
            name: "Alice".into(),
            email: "alice@example.com".into(),
            password_hash: "x".into(),
            created_at: time::OffsetDateTime::now_utc(),
            updated_at: time::OffsetDateTime::now_utc(),
            last_login_at: None,
        };
        let (body, headers) = issue_pair(&state, &user).expect("issue pair");
        let cookies: Vec<_> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with(&format!("auth_token={}", body.access_token)));
        assert!(cookies[1].starts_with(&format!("auth_token_refresh={}", body.refresh_token)));
        assert!(cookies.iter().all(|c| c.contains("HttpOnly")));
    }
}
