use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use dental_db::models::{
    MedicalAttention, MedicalAttentionFilter, MedicalAttentionUpdate, MedicalHistory,
    MedicalHistoryUpdate, NewMedicalAttention, NewMedicalHistory, Paginated, Role,
};
use dental_db::repo;
use serde::Deserialize;
use uuid::Uuid;

use super::PageQuery;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{Path, Query, ValidJson};
use crate::state::AppState;

const CLINICAL: &[Role] = &[Role::Admin, Role::Doctor];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/medical-attentions", get(list_attentions).post(record_attention))
        .route(
            "/medical-attentions/:id",
            get(show_attention).put(update_attention).delete(delete_attention),
        )
        .route("/medical-histories", get(list_histories).post(create_history))
        .route(
            "/medical-histories/:id",
            get(show_history).put(update_history).delete(delete_history),
        )
}

#[derive(Debug, Deserialize)]
struct AttentionQuery {
    patient_id: Option<Uuid>,
    doctor_id: Option<Uuid>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_attentions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AttentionQuery>,
) -> ApiResult<Json<Paginated<MedicalAttention>>> {
    user.require(CLINICAL)?;
    let filter = MedicalAttentionFilter {
        patient_id: query.patient_id,
        doctor_id: query.doctor_id,
    };
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(
        repo::medical::list_attentions(&state.db.pool, &state.db.cipher, &filter, page.into())
            .await?,
    ))
}

/// Médicos registram atendimento apenas das próprias consultas
async fn record_attention(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<NewMedicalAttention>,
) -> ApiResult<(StatusCode, Json<MedicalAttention>)> {
    user.require(CLINICAL)?;
    let appointment = repo::appointments::get(&state.db.pool, body.appointment_id).await?;
    user.ensure_own_doctor(appointment.doctor_id)?;

    let attention =
        repo::medical::record_attention(&state.db.pool, &state.db.cipher, &body).await?;
    Ok((StatusCode::CREATED, Json(attention)))
}

async fn show_attention(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MedicalAttention>> {
    user.require(CLINICAL)?;
    Ok(Json(
        repo::medical::get_attention(&state.db.pool, &state.db.cipher, id).await?,
    ))
}

async fn update_attention(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<MedicalAttentionUpdate>,
) -> ApiResult<Json<MedicalAttention>> {
    user.require(CLINICAL)?;
    let current = repo::medical::get_attention(&state.db.pool, &state.db.cipher, id).await?;
    user.ensure_own_doctor(current.doctor_id)?;
    Ok(Json(
        repo::medical::update_attention(&state.db.pool, &state.db.cipher, id, &body).await?,
    ))
}

async fn delete_attention(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require(CLINICAL)?;
    let current = repo::medical::get_attention(&state.db.pool, &state.db.cipher, id).await?;
    user.ensure_own_doctor(current.doctor_id)?;
    repo::medical::delete_attention(&state.db.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_histories(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Paginated<MedicalHistory>>> {
    user.require(CLINICAL)?;
    Ok(Json(
        repo::medical::list_histories(&state.db.pool, &state.db.cipher, page.into()).await?,
    ))
}

async fn create_history(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<NewMedicalHistory>,
) -> ApiResult<(StatusCode, Json<MedicalHistory>)> {
    user.require(CLINICAL)?;
    let history = repo::medical::create_history(&state.db.pool, &state.db.cipher, &body).await?;
    Ok((StatusCode::CREATED, Json(history)))
}

async fn show_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MedicalHistory>> {
    user.require(CLINICAL)?;
    Ok(Json(
        repo::medical::get_history(&state.db.pool, &state.db.cipher, id).await?,
    ))
}

async fn update_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<MedicalHistoryUpdate>,
) -> ApiResult<Json<MedicalHistory>> {
    user.require(CLINICAL)?;
    Ok(Json(
        repo::medical::update_history(&state.db.pool, &state.db.cipher, id, &body).await?,
    ))
}

async fn delete_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    repo::medical::delete_history(&state.db.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
