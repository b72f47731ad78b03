use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{like_pattern, paginate};
use crate::error::{DbError, DbResult};
use crate::models::{Doctor, DoctorFilter, DoctorUpdate, NewDoctor, Page, Paginated};

const COLUMNS: &str =
    "id, ci, first_name, last_name, email, phone, specialty, active, created_at, updated_at";

pub async fn create(pool: &SqlitePool, new: &NewDoctor) -> DbResult<Doctor> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO doctors (id, ci, first_name, last_name, email, phone, specialty, active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(new.ci.trim())
    .bind(new.first_name.trim())
    .bind(new.last_name.trim())
    .bind(new.email.to_lowercase())
    .bind(&new.phone)
    .bind(&new.specialty)
    .bind(new.active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    info!(doctor_id = %id, "Médico cadastrado");
    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> DbResult<Doctor> {
    sqlx::query_as::<_, Doctor>(&format!("SELECT {} FROM doctors WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("médico", id))
}

pub async fn list(pool: &SqlitePool, filter: &DoctorFilter, page: Page) -> DbResult<Paginated<Doctor>> {
    let search = filter
        .search
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(like_pattern);
    let active = filter.active;

    paginate(pool, COLUMNS, "doctors", "last_name, first_name", page, |qb| {
        if let Some(active) = active {
            qb.push(" AND active = ").push_bind(active);
        }
        if let Some(pattern) = &search {
            qb.push(" AND (first_name || ' ' || last_name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR ci LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR specialty LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\')");
        }
    })
    .await
}

pub async fn update(pool: &SqlitePool, id: Uuid, patch: &DoctorUpdate) -> DbResult<Doctor> {
    let result = sqlx::query(
        "UPDATE doctors SET \
            ci = COALESCE(?, ci), \
            first_name = COALESCE(?, first_name), \
            last_name = COALESCE(?, last_name), \
            email = COALESCE(?, email), \
            phone = COALESCE(?, phone), \
            specialty = COALESCE(?, specialty), \
            active = COALESCE(?, active), \
            updated_at = ? \
         WHERE id = ?",
    )
    .bind(patch.ci.as_deref().map(str::trim))
    .bind(patch.first_name.as_deref().map(str::trim))
    .bind(patch.last_name.as_deref().map(str::trim))
    .bind(patch.email.as_deref().map(str::to_lowercase))
    .bind(&patch.phone)
    .bind(&patch.specialty)
    .bind(patch.active)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("médico", id));
    }
    get(pool, id).await
}

/// Médicos com consultas ou atendimentos não podem ser removidos; devem ser
/// desativados.
pub async fn delete(pool: &SqlitePool, id: Uuid) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM doctors WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("médico", id));
    }
    info!(doctor_id = %id, "Médico removido");
    Ok(())
}
