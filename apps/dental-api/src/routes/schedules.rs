//! Expedientes e licenças dos médicos

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dental_db::models::{
    DoctorPermission, DoctorPermissionFilter, DoctorPermissionUpdate, NewDoctorPermission,
    NewWorkSchedule, Paginated, PermissionStatus, WorkSchedule, WorkScheduleFilter,
    WorkScheduleUpdate,
};
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
        .route("/work-schedules", get(list_schedules).post(create_schedule))
        .route(
            "/work-schedules/:id",
            get(show_schedule).put(update_schedule).delete(delete_schedule),
        )
        .route("/doctor-permissions", get(list_permissions).post(create_permission))
        .route(
            "/doctor-permissions/:id",
            get(show_permission)
                .put(update_permission)
                .delete(delete_permission),
        )
        .route("/doctor-permissions/:id/approve", post(approve_permission))
        .route("/doctor-permissions/:id/reject", post(reject_permission))
}

#[derive(Debug, Deserialize)]
struct ScheduleQuery {
    doctor_id: Option<Uuid>,
    day_of_week: Option<i32>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_schedules(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ScheduleQuery>,
) -> ApiResult<Json<Paginated<WorkSchedule>>> {
    let filter = WorkScheduleFilter {
        doctor_id: query.doctor_id,
        day_of_week: query.day_of_week,
    };
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(
        repo::schedules::list_work_schedules(&state.db.pool, &filter, page.into()).await?,
    ))
}

async fn create_schedule(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<NewWorkSchedule>,
) -> ApiResult<(StatusCode, Json<WorkSchedule>)> {
    user.require_admin()?;
    let schedule = repo::schedules::create_work_schedule(&state.db.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

async fn show_schedule(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkSchedule>> {
    Ok(Json(repo::schedules::get_work_schedule(&state.db.pool, id).await?))
}

async fn update_schedule(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<WorkScheduleUpdate>,
) -> ApiResult<Json<WorkSchedule>> {
    user.require_admin()?;
    Ok(Json(
        repo::schedules::update_work_schedule(&state.db.pool, id, &body).await?,
    ))
}

async fn delete_schedule(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    repo::schedules::delete_work_schedule(&state.db.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct PermissionQuery {
    doctor_id: Option<Uuid>,
    status: Option<PermissionStatus>,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Médicos veem apenas as próprias licenças
async fn list_permissions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PermissionQuery>,
) -> ApiResult<Json<Paginated<DoctorPermission>>> {
    let doctor_id = if user.is_doctor() {
        Some(user.linked_doctor()?)
    } else {
        query.doctor_id
    };
    let filter = DoctorPermissionFilter {
        doctor_id,
        status: query.status,
    };
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(
        repo::schedules::list_permissions(&state.db.pool, &filter, page.into()).await?,
    ))
}

async fn create_permission(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<NewDoctorPermission>,
) -> ApiResult<(StatusCode, Json<DoctorPermission>)> {
    user.ensure_own_doctor(body.doctor_id)?;
    let permission = repo::schedules::create_permission(&state.db.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

async fn show_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DoctorPermission>> {
    let permission = repo::schedules::get_permission(&state.db.pool, id).await?;
    user.ensure_own_doctor(permission.doctor_id)?;
    Ok(Json(permission))
}

async fn update_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<DoctorPermissionUpdate>,
) -> ApiResult<Json<DoctorPermission>> {
    let current = repo::schedules::get_permission(&state.db.pool, id).await?;
    user.ensure_own_doctor(current.doctor_id)?;
    Ok(Json(
        repo::schedules::update_permission(&state.db.pool, id, &body).await?,
    ))
}

async fn delete_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    repo::schedules::delete_permission(&state.db.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn approve_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DoctorPermission>> {
    user.require_admin()?;
    Ok(Json(
        repo::schedules::decide_permission(&state.db.pool, id, PermissionStatus::Approved).await?,
    ))
}

async fn reject_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DoctorPermission>> {
    user.require_admin()?;
    Ok(Json(
        repo::schedules::decide_permission(&state.db.pool, id, PermissionStatus::Rejected).await?,
    ))
}
