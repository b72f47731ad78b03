use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::build_info;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    sqlx::query("SELECT 1")
        .execute(&state.db.pool)
        .await
        .map_err(|e| ApiError::Internal(format!("banco indisponível: {}", e)))?;

    Ok(Json(json!({
        "status": "ok",
        "service": build_info::PKG_NAME,
        "version": build_info::PKG_VERSION,
        "profile": build_info::PROFILE,
    })))
}
