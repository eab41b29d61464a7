use crate::db;
use crate::middleware::{client_ip, RateLimiter};
use crate::state::SharedState;
use crate::web::session::{self, UserSession};
use crate::web::ErrorBody;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Brute-force guard on the credential check, per client IP.
static SIGN_IN_LIMITER: Lazy<RateLimiter> = Lazy::new(|| RateLimiter::new(5, 60));

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/sign-in", post(sign_in))
        .route("/sign-out", post(sign_out))
        .route("/me", get(me))
        .with_state(state)
}

async fn sign_up(
    State(state): State<SharedState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let name = payload.name.trim();
    let email = payload.email.trim().to_lowercase();

    if name.len() < 3 {
        return Err(bad_request("name must be at least 3 characters"));
    }
    if !email.contains('@') || email.len() < 4 {
        return Err(bad_request("a valid email is required"));
    }
    if payload.password.len() < 3 {
        return Err(bad_request("password must be at least 3 characters"));
    }

    let existing = db::find_user_by_email(&state.pool, &email)
        .await
        .map_err(internal)?;
    if existing.is_some() {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorBody::new("an account with this email already exists")),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(internal)?
        .to_string();

    let user_id = db::create_user(&state.pool, name, &email, &hash)
        .await
        .map_err(internal)?;
    tracing::info!("User {} signed up", user_id);

    // No cookie here: the account is created and the client signs in next.
    Ok((
        StatusCode::CREATED,
        Json(UserView {
            id: user_id,
            name: name.to_string(),
            email,
            created_at: Utc::now(),
        }),
    ))
}

async fn sign_in(
    headers: HeaderMap,
    State(state): State<SharedState>,
    Json(payload): Json<SignInRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let ip = client_ip(&headers);
    if !SIGN_IN_LIMITER.allow(&ip).await {
        tracing::warn!("Sign-in rate limit exceeded for IP: {}", ip);
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody::new("too many sign-in attempts")),
        ));
    }

    let email = payload.email.trim().to_lowercase();
    let user = db::find_user_by_email(&state.pool, &email)
        .await
        .map_err(internal)?
        .ok_or_else(unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.hash).map_err(|_| unauthorized())?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| unauthorized())?;

    let token = session::sign_session(user.id, &state.session_key).map_err(internal)?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        axum::http::header::SET_COOKIE,
        session::session_cookie(&token)
            .parse()
            .map_err(internal)?,
    );

    Ok((
        response_headers,
        Json(UserView {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
        }),
    ))
}

async fn sign_out() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    if let Ok(value) = session::clear_session_cookie().parse() {
        headers.insert(axum::http::header::SET_COOKIE, value);
    }
    (headers, StatusCode::NO_CONTENT)
}

/// The client's `isAuthenticated` / `getCurrentUser` check: 200 with the user
/// for a valid session, 401 otherwise.
async fn me(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<UserView>, StatusCode> {
    let user = db::find_user_by_id(&state.pool, user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(Json(UserView {
        id: user.id,
        name: user.name,
        email: user.email,
        created_at: user.created_at,
    }))
}

fn bad_request(msg: &str) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(msg)))
}

fn unauthorized() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody::new("invalid email or password")),
    )
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, Json<ErrorBody>) {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("internal server error")),
    )
}
