use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Datelike, Local, NaiveDate};
use dental_db::reports::{self, AppointmentsReport, IncomeReport, NewPatientsReport, TreatmentsReport};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::Query;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/income", get(income))
        .route("/reports/appointments", get(appointments))
        .route("/reports/treatments", get(treatments))
        .route("/reports/patients", get(new_patients))
}

#[derive(Debug, Deserialize)]
struct Period {
    from: NaiveDate,
    to: NaiveDate,
}

impl Period {
    fn checked(self) -> ApiResult<Self> {
        if self.from > self.to {
            return Err(ApiError::BadRequest(format!(
                "período inválido: {} é posterior a {}",
                self.from, self.to
            )));
        }
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
struct YearQuery {
    year: Option<i32>,
}

async fn income(
    State(state): State<AppState>,
    user: AuthUser,
    Query(period): Query<Period>,
) -> ApiResult<Json<IncomeReport>> {
    user.require_admin()?;
    let period = period.checked()?;
    Ok(Json(reports::income(&state.db.pool, period.from, period.to).await?))
}

async fn appointments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(period): Query<Period>,
) -> ApiResult<Json<AppointmentsReport>> {
    user.require_admin()?;
    let period = period.checked()?;
    Ok(Json(
        reports::appointments(&state.db.pool, period.from, period.to).await?,
    ))
}

async fn treatments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(period): Query<Period>,
) -> ApiResult<Json<TreatmentsReport>> {
    user.require_admin()?;
    let period = period.checked()?;
    Ok(Json(
        reports::treatments(&state.db.pool, period.from, period.to).await?,
    ))
}

async fn new_patients(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<YearQuery>,
) -> ApiResult<Json<NewPatientsReport>> {
    user.require_admin()?;
    let year = query.year.unwrap_or_else(|| Local::now().year());
    if !(1900..=9999).contains(&year) {
        return Err(ApiError::BadRequest(format!("ano inválido: {}", year)));
    }
    Ok(Json(reports::new_patients(&state.db.pool, year).await?))
}
