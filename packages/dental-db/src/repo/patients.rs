use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{like_pattern, paginate};
use crate::error::{DbError, DbResult};
use crate::models::{
    NewPatient, Page, Paginated, Patient, PatientBalance, PatientFilter, PatientUpdate,
};

const COLUMNS: &str = "id, ci, first_name, last_name, email, phone, birth_date, gender, address, created_at, updated_at";

pub async fn create(pool: &SqlitePool, new: &NewPatient) -> DbResult<Patient> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO patients (id, ci, first_name, last_name, email, phone, birth_date, gender, address, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(new.ci.trim())
    .bind(new.first_name.trim())
    .bind(new.last_name.trim())
    .bind(new.email.as_deref().map(str::to_lowercase))
    .bind(&new.phone)
    .bind(new.birth_date)
    .bind(&new.gender)
    .bind(&new.address)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    info!(patient_id = %id, "Paciente cadastrado");
    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> DbResult<Patient> {
    sqlx::query_as::<_, Patient>(&format!("SELECT {} FROM patients WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("paciente", id))
}

pub async fn find_by_ci(pool: &SqlitePool, ci: &str) -> DbResult<Option<Patient>> {
    Ok(
        sqlx::query_as::<_, Patient>(&format!("SELECT {} FROM patients WHERE ci = ?", COLUMNS))
            .bind(ci.trim())
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn list(pool: &SqlitePool, filter: &PatientFilter, page: Page) -> DbResult<Paginated<Patient>> {
    let search = filter
        .search
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(like_pattern);

    paginate(pool, COLUMNS, "patients", "last_name, first_name", page, |qb| {
        if let Some(pattern) = &search {
            qb.push(" AND (first_name || ' ' || last_name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR ci LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR email LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\')");
        }
    })
    .await
}

pub async fn update(pool: &SqlitePool, id: Uuid, patch: &PatientUpdate) -> DbResult<Patient> {
    let result = sqlx::query(
        "UPDATE patients SET \
            ci = COALESCE(?, ci), \
            first_name = COALESCE(?, first_name), \
            last_name = COALESCE(?, last_name), \
            email = COALESCE(?, email), \
            phone = COALESCE(?, phone), \
            birth_date = COALESCE(?, birth_date), \
            gender = COALESCE(?, gender), \
            address = COALESCE(?, address), \
            updated_at = ? \
         WHERE id = ?",
    )
    .bind(patch.ci.as_deref().map(str::trim))
    .bind(patch.first_name.as_deref().map(str::trim))
    .bind(patch.last_name.as_deref().map(str::trim))
    .bind(patch.email.as_deref().map(str::to_lowercase))
    .bind(&patch.phone)
    .bind(patch.birth_date)
    .bind(&patch.gender)
    .bind(&patch.address)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("paciente", id));
    }
    get(pool, id).await
}

/// Remove o paciente com consultas e prontuário. Pacientes com pagamentos
/// registrados não podem ser removidos.
pub async fn delete(pool: &SqlitePool, id: Uuid) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM patients WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("paciente", id));
    }
    info!(patient_id = %id, "Paciente removido");
    Ok(())
}

/// Faturado (tratamentos das consultas concluídas) menos pago
pub async fn balance(pool: &SqlitePool, id: Uuid) -> DbResult<PatientBalance> {
    get(pool, id).await?;

    let billed_cents: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(t.price_cents), 0) FROM appointments a \
         JOIN treatments t ON t.id = a.treatment_id \
         WHERE a.patient_id = ? AND a.status = 'completed'",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    let paid_cents: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(amount_cents), 0) FROM payments WHERE patient_id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;

    Ok(PatientBalance {
        patient_id: id,
        billed_cents,
        paid_cents,
        due_cents: billed_cents - paid_cents,
    })
}
