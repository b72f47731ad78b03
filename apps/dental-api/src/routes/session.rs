use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dental_db::models::{NewUser, User};
use dental_db::repo;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::{self, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::ValidJson;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .route("/auth/register", post(register))
}

#[derive(Debug, Deserialize, Validate)]
struct LoginRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1, max = 128))]
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    token_type: &'static str,
    expires_in: i64,
    user: User,
}

async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = repo::users::find_by_email(&state.db.pool, &body.email).await?;
    let user = match user {
        Some(user) if auth::verify_password(&body.password, &user.password_hash) => user,
        _ => {
            warn!(email = %body.email, "Falha de login");
            return Err(ApiError::InvalidCredentials);
        }
    };

    let token = state.tokens.issue(&user)?;
    info!(user_id = %user.id, role = %user.role, "Login");
    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: state.tokens.ttl_seconds(),
        user,
    }))
}

async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<User>> {
    Ok(Json(repo::users::get(&state.db.pool, user.id).await?))
}

/// Tokens não são guardados no servidor; o cliente apenas descarta o seu
async fn logout(user: AuthUser) -> StatusCode {
    info!(user_id = %user.id, "Logout");
    StatusCode::NO_CONTENT
}

async fn register(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    user.require_admin()?;
    let hash = auth::hash_password(&body.password)?;
    let created = repo::users::create(&state.db.pool, &body, &hash).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
