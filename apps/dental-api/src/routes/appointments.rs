use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use dental_db::models::{
    Appointment, AppointmentFilter, AppointmentStatus, AppointmentSummary, AppointmentUpdate,
    NewAppointment, Paginated,
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
        .route("/appointments", get(list).post(book))
        .route("/appointments/:id", get(show).put(update).delete(destroy))
        .route("/appointments/:id/cancel", post(cancel))
        .route("/appointments/:id/no-show", post(no_show))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    doctor_id: Option<Uuid>,
    patient_id: Option<Uuid>,
    status: Option<AppointmentStatus>,
    date: Option<NaiveDate>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Médicos veem apenas a própria agenda
async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<AppointmentSummary>>> {
    let doctor_id = match (user.is_doctor(), query.doctor_id) {
        (true, Some(requested)) => {
            user.ensure_own_doctor(requested)?;
            Some(requested)
        }
        (true, None) => Some(user.linked_doctor()?),
        (false, requested) => requested,
    };
    let filter = AppointmentFilter {
        doctor_id,
        patient_id: query.patient_id,
        status: query.status,
        date: query.date,
        from: query.from,
        to: query.to,
    };
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(
        repo::appointments::list(&state.db.pool, &filter, page.into()).await?,
    ))
}

async fn book(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<NewAppointment>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    user.ensure_own_doctor(body.doctor_id)?;
    let appointment = repo::appointments::book(&state.db.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn show(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AppointmentSummary>> {
    let summary = repo::appointments::get_summary(&state.db.pool, id).await?;
    user.ensure_own_doctor(summary.doctor_id)?;
    Ok(Json(summary))
}

async fn owned(state: &AppState, user: &AuthUser, id: Uuid) -> ApiResult<Appointment> {
    let appointment = repo::appointments::get(&state.db.pool, id).await?;
    user.ensure_own_doctor(appointment.doctor_id)?;
    Ok(appointment)
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<AppointmentUpdate>,
) -> ApiResult<Json<Appointment>> {
    owned(&state, &user, id).await?;
    if let Some(doctor_id) = body.doctor_id {
        user.ensure_own_doctor(doctor_id)?;
    }
    Ok(Json(
        repo::appointments::update(&state.db.pool, id, &body).await?,
    ))
}

async fn destroy(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    owned(&state, &user, id).await?;
    repo::appointments::delete(&state.db.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    owned(&state, &user, id).await?;
    Ok(Json(
        repo::appointments::set_status(&state.db.pool, id, AppointmentStatus::Canceled).await?,
    ))
}

async fn no_show(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    owned(&state, &user, id).await?;
    Ok(Json(
        repo::appointments::set_status(&state.db.pool, id, AppointmentStatus::NoShow).await?,
    ))
}
