use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use dental_db::models::{Availability, Doctor, DoctorFilter, DoctorUpdate, NewDoctor, Paginated};
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
        .route("/doctors", get(list).post(create))
        .route("/doctors/:id", get(show).put(update).delete(destroy))
        .route("/doctors/:id/availability", get(availability))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    search: Option<String>,
    active: Option<bool>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    date: NaiveDate,
}

async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<Doctor>>> {
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    };
    let filter = DoctorFilter {
        search: query.search,
        active: query.active,
    };
    Ok(Json(repo::doctors::list(&state.db.pool, &filter, page.into()).await?))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<NewDoctor>,
) -> ApiResult<(StatusCode, Json<Doctor>)> {
    user.require_admin()?;
    let doctor = repo::doctors::create(&state.db.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

async fn show(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Doctor>> {
    Ok(Json(repo::doctors::get(&state.db.pool, id).await?))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<DoctorUpdate>,
) -> ApiResult<Json<Doctor>> {
    user.require_admin()?;
    Ok(Json(repo::doctors::update(&state.db.pool, id, &body).await?))
}

async fn destroy(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    repo::doctors::delete(&state.db.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn availability(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<Json<Availability>> {
    Ok(Json(
        repo::appointments::availability(&state.db.pool, id, query.date).await?,
    ))
}
