use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use dental_db::models::{NewTreatment, Paginated, Treatment, TreatmentFilter, TreatmentUpdate};
use dental_db::repo;
use serde::Deserialize;
use uuid::Uuid;

use super::PageQuery;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{Path, Query, ValidJson};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/treatments", get(list).post(create))
        .route("/treatments/:id", get(show).put(update).delete(destroy))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    search: Option<String>,
    active: Option<bool>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<Treatment>>> {
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    };
    let filter = TreatmentFilter {
        active: query.active,
        search: query.search,
    };
    Ok(Json(
        repo::treatments::list(&state.db.pool, &filter, page.into()).await?,
    ))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<NewTreatment>,
) -> ApiResult<(StatusCode, Json<Treatment>)> {
    user.require_admin()?;
    let treatment = repo::treatments::create(&state.db.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(treatment)))
}

async fn show(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Treatment>> {
    Ok(Json(repo::treatments::get(&state.db.pool, id).await?))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<TreatmentUpdate>,
) -> ApiResult<Json<Treatment>> {
    user.require_admin()?;
    Ok(Json(repo::treatments::update(&state.db.pool, id, &body).await?))
}

async fn destroy(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    repo::treatments::delete(&state.db.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
