use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use dental_db::models::{
    ClinicalNotes, MedicalHistory, NewPatient, Paginated, Patient, PatientBalance, PatientFilter, PatientUpdate,
    Role,
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
        .route("/patients", get(list).post(create))
        .route("/patients/:id", get(show).put(update).delete(destroy))
        .route("/patients/:id/balance", get(balance))
        .route(
            "/patients/:id/medical-history",
            get(medical_history).put(upsert_medical_history),
        )
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    search: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<Patient>>> {
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    };
    let filter = PatientFilter {
        search: query.search,
    };
    Ok(Json(
        repo::patients::list(&state.db.pool, &filter, page.into()).await?,
    ))
}

async fn create(
    State(state): State<AppState>,
    _user: AuthUser,
    ValidJson(body): ValidJson<NewPatient>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    let patient = repo::patients::create(&state.db.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

async fn show(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(repo::patients::get(&state.db.pool, id).await?))
}

async fn update(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<PatientUpdate>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(repo::patients::update(&state.db.pool, id, &body).await?))
}

async fn destroy(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    repo::patients::delete(&state.db.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn balance(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PatientBalance>> {
    Ok(Json(repo::patients::balance(&state.db.pool, id).await?))
}

async fn medical_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MedicalHistory>> {
    user.require(&[Role::Admin, Role::Doctor])?;
    Ok(Json(
        repo::medical::get_history_by_patient(&state.db.pool, &state.db.cipher, id).await?,
    ))
}

/// Cria o histórico se ainda não existir e mescla as anotações enviadas
async fn upsert_medical_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<ClinicalNotes>,
) -> ApiResult<Json<MedicalHistory>> {
    user.require(&[Role::Admin, Role::Doctor])?;
    Ok(Json(
        repo::medical::upsert_history_for_patient(&state.db.pool, &state.db.cipher, id, body)
            .await?,
    ))
}
