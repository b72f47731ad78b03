//! Rotas da API, uma submódulo por recurso

use axum::Router;
use dental_db::models::Page;
use serde::Deserialize;

use crate::state::AppState;

mod appointments;
mod doctors;
mod health;
mod medical;
mod patients;
mod payments;
mod reports;
mod schedules;
mod session;
mod treatments;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(session::routes())
        .merge(patients::routes())
        .merge(doctors::routes())
        .merge(treatments::routes())
        .merge(appointments::routes())
        .merge(payments::routes())
        .merge(medical::routes())
        .merge(schedules::routes())
        .merge(reports::routes())
}

/// Parâmetros `limit`/`offset` comuns às listagens
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<PageQuery> for Page {
    fn from(query: PageQuery) -> Self {
        Page {
            limit: query.limit,
            offset: query.offset,
        }
    }
}
