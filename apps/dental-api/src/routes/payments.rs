use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use dental_db::models::{
    NewPayment, Paginated, Payment, PaymentFilter, PaymentMethod, PaymentUpdate, Role,
};
use dental_db::repo;
use serde::Deserialize;
use uuid::Uuid;

use super::PageQuery;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{Path, Query, ValidJson};
use crate::state::AppState;

const CASHIERS: &[Role] = &[Role::Admin, Role::Receptionist];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments", get(list).post(create))
        .route("/payments/:id", get(show).put(update).delete(destroy))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    patient_id: Option<Uuid>,
    appointment_id: Option<Uuid>,
    method: Option<PaymentMethod>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<Payment>>> {
    user.require(CASHIERS)?;
    let filter = PaymentFilter {
        patient_id: query.patient_id,
        appointment_id: query.appointment_id,
        method: query.method,
        from: query.from,
        to: query.to,
    };
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(repo::payments::list(&state.db.pool, &filter, page.into()).await?))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<NewPayment>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    user.require(CASHIERS)?;
    let payment = repo::payments::create(&state.db.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn show(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payment>> {
    user.require(CASHIERS)?;
    Ok(Json(repo::payments::get(&state.db.pool, id).await?))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<PaymentUpdate>,
) -> ApiResult<Json<Payment>> {
    user.require(CASHIERS)?;
    Ok(Json(repo::payments::update(&state.db.pool, id, &body).await?))
}

async fn destroy(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require(CASHIERS)?;
    repo::payments::delete(&state.db.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
