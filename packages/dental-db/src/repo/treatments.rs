use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{like_pattern, paginate};
use crate::error::{DbError, DbResult};
use crate::models::{NewTreatment, Page, Paginated, Treatment, TreatmentFilter, TreatmentUpdate};

const COLUMNS: &str = "id, name, description, price_cents, active, created_at, updated_at";

pub async fn create(pool: &SqlitePool, new: &NewTreatment) -> DbResult<Treatment> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO treatments (id, name, description, price_cents, active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(new.name.trim())
    .bind(&new.description)
    .bind(new.price_cents)
    .bind(new.active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    info!(treatment_id = %id, name = %new.name, "Tratamento cadastrado");
    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> DbResult<Treatment> {
    sqlx::query_as::<_, Treatment>(&format!("SELECT {} FROM treatments WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("tratamento", id))
}

pub async fn list(
    pool: &SqlitePool,
    filter: &TreatmentFilter,
    page: Page,
) -> DbResult<Paginated<Treatment>> {
    let search = filter
        .search
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(like_pattern);
    let active = filter.active;

    paginate(pool, COLUMNS, "treatments", "name", page, |qb| {
        if let Some(active) = active {
            qb.push(" AND active = ").push_bind(active);
        }
        if let Some(pattern) = &search {
            qb.push(" AND name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\'");
        }
    })
    .await
}

pub async fn update(pool: &SqlitePool, id: Uuid, patch: &TreatmentUpdate) -> DbResult<Treatment> {
    let result = sqlx::query(
        "UPDATE treatments SET \
            name = COALESCE(?, name), \
            description = COALESCE(?, description), \
            price_cents = COALESCE(?, price_cents), \
            active = COALESCE(?, active), \
            updated_at = ? \
         WHERE id = ?",
    )
    .bind(patch.name.as_deref().map(str::trim))
    .bind(&patch.description)
    .bind(patch.price_cents)
    .bind(patch.active)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("tratamento", id));
    }
    get(pool, id).await
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM treatments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("tratamento", id));
    }
    Ok(())
}
