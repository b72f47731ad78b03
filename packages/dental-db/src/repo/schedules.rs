//! Expedientes semanais e licenças dos médicos

use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::paginate;
use crate::error::{DbError, DbResult};
use crate::models::{
    DoctorPermission, DoctorPermissionFilter, DoctorPermissionUpdate, NewDoctorPermission,
    NewWorkSchedule, Page, Paginated, PermissionStatus, WorkSchedule, WorkScheduleFilter,
    WorkScheduleUpdate,
};

const SCHEDULE_COLUMNS: &str =
    "id, doctor_id, day_of_week, start_time, end_time, created_at, updated_at";
const PERMISSION_COLUMNS: &str =
    "id, doctor_id, start_date, end_date, reason, status, created_at, updated_at";

// ---------------------------------------------------------------------------
// Expedientes
// ---------------------------------------------------------------------------

/// Blocos de um médico num dia da semana
pub(crate) async fn schedules_for_day(
    conn: &mut SqliteConnection,
    doctor_id: Uuid,
    day_of_week: i32,
) -> DbResult<Vec<WorkSchedule>> {
    Ok(sqlx::query_as::<_, WorkSchedule>(&format!(
        "SELECT {} FROM work_schedules WHERE doctor_id = ? AND day_of_week = ? ORDER BY start_time",
        SCHEDULE_COLUMNS
    ))
    .bind(doctor_id)
    .bind(day_of_week)
    .fetch_all(conn)
    .await?)
}

async fn ensure_no_block_overlap(
    conn: &mut SqliteConnection,
    doctor_id: Uuid,
    day_of_week: i32,
    start: NaiveTime,
    end: NaiveTime,
    ignore: Option<Uuid>,
) -> DbResult<()> {
    if start >= end {
        return Err(DbError::InvalidOperation(
            "o início do expediente deve ser anterior ao fim".to_string(),
        ));
    }

    let existing = schedules_for_day(conn, doctor_id, day_of_week).await?;
    if let Some(clash) = existing
        .iter()
        .filter(|s| Some(s.id) != ignore)
        .find(|s| start < s.end_time && s.start_time < end)
    {
        return Err(DbError::ScheduleConflict(format!(
            "expediente sobreposto ao bloco {}-{}",
            clash.start_time.format("%H:%M"),
            clash.end_time.format("%H:%M")
        )));
    }
    Ok(())
}

pub async fn create_work_schedule(pool: &SqlitePool, new: &NewWorkSchedule) -> DbResult<WorkSchedule> {
    super::doctors::get(pool, new.doctor_id).await?;

    let mut tx = pool.begin().await?;
    if !super::lock_row(&mut tx, "doctors", new.doctor_id).await? {
        return Err(DbError::not_found("médico", new.doctor_id));
    }
    ensure_no_block_overlap(
        &mut tx,
        new.doctor_id,
        new.day_of_week,
        new.start_time,
        new.end_time,
        None,
    )
    .await?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO work_schedules (id, doctor_id, day_of_week, start_time, end_time, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(new.doctor_id)
    .bind(new.day_of_week)
    .bind(new.start_time)
    .bind(new.end_time)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    get_work_schedule(pool, id).await
}

pub async fn get_work_schedule(pool: &SqlitePool, id: Uuid) -> DbResult<WorkSchedule> {
    sqlx::query_as::<_, WorkSchedule>(&format!(
        "SELECT {} FROM work_schedules WHERE id = ?",
        SCHEDULE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("expediente", id))
}

pub async fn list_work_schedules(
    pool: &SqlitePool,
    filter: &WorkScheduleFilter,
    page: Page,
) -> DbResult<Paginated<WorkSchedule>> {
    let (doctor_id, day) = (filter.doctor_id, filter.day_of_week);
    paginate(
        pool,
        SCHEDULE_COLUMNS,
        "work_schedules",
        "doctor_id, day_of_week, start_time",
        page,
        |qb| {
            if let Some(doctor_id) = doctor_id {
                qb.push(" AND doctor_id = ").push_bind(doctor_id);
            }
            if let Some(day) = day {
                qb.push(" AND day_of_week = ").push_bind(day);
            }
        },
    )
    .await
}

pub async fn update_work_schedule(
    pool: &SqlitePool,
    id: Uuid,
    patch: &WorkScheduleUpdate,
) -> DbResult<WorkSchedule> {
    let current = get_work_schedule(pool, id).await?;
    let day = patch.day_of_week.unwrap_or(current.day_of_week);
    let start = patch.start_time.unwrap_or(current.start_time);
    let end = patch.end_time.unwrap_or(current.end_time);

    let mut tx = pool.begin().await?;
    super::lock_row(&mut tx, "doctors", current.doctor_id).await?;
    ensure_no_block_overlap(&mut tx, current.doctor_id, day, start, end, Some(id)).await?;

    sqlx::query(
        "UPDATE work_schedules SET day_of_week = ?, start_time = ?, end_time = ?, updated_at = ? WHERE id = ?",
    )
    .bind(day)
    .bind(start)
    .bind(end)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    get_work_schedule(pool, id).await
}

pub async fn delete_work_schedule(pool: &SqlitePool, id: Uuid) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM work_schedules WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("expediente", id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Licenças
// ---------------------------------------------------------------------------

/// Licenças aprovadas de um médico que cobrem a data
pub(crate) async fn approved_permissions_on(
    conn: &mut SqliteConnection,
    doctor_id: Uuid,
    date: NaiveDate,
) -> DbResult<Vec<DoctorPermission>> {
    Ok(sqlx::query_as::<_, DoctorPermission>(&format!(
        "SELECT {} FROM doctor_permissions \
         WHERE doctor_id = ? AND status = 'approved' AND start_date <= ? AND end_date >= ?",
        PERMISSION_COLUMNS
    ))
    .bind(doctor_id)
    .bind(date)
    .bind(date)
    .fetch_all(conn)
    .await?)
}

pub async fn create_permission(
    pool: &SqlitePool,
    new: &NewDoctorPermission,
) -> DbResult<DoctorPermission> {
    if new.start_date > new.end_date {
        return Err(DbError::InvalidOperation(
            "a data inicial deve ser anterior ou igual à final".to_string(),
        ));
    }
    super::doctors::get(pool, new.doctor_id).await?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO doctor_permissions (id, doctor_id, start_date, end_date, reason, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(new.doctor_id)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.reason.trim())
    .bind(PermissionStatus::Pending)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    info!(permission_id = %id, doctor_id = %new.doctor_id, "Licença solicitada");
    get_permission(pool, id).await
}

pub async fn get_permission(pool: &SqlitePool, id: Uuid) -> DbResult<DoctorPermission> {
    sqlx::query_as::<_, DoctorPermission>(&format!(
        "SELECT {} FROM doctor_permissions WHERE id = ?",
        PERMISSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("licença", id))
}

pub async fn list_permissions(
    pool: &SqlitePool,
    filter: &DoctorPermissionFilter,
    page: Page,
) -> DbResult<Paginated<DoctorPermission>> {
    let (doctor_id, status) = (filter.doctor_id, filter.status);
    paginate(
        pool,
        PERMISSION_COLUMNS,
        "doctor_permissions",
        "start_date DESC",
        page,
        |qb| {
            if let Some(doctor_id) = doctor_id {
                qb.push(" AND doctor_id = ").push_bind(doctor_id);
            }
            if let Some(status) = status {
                qb.push(" AND status = ").push_bind(status);
            }
        },
    )
    .await
}

/// Apenas licenças pendentes podem ser alteradas
pub async fn update_permission(
    pool: &SqlitePool,
    id: Uuid,
    patch: &DoctorPermissionUpdate,
) -> DbResult<DoctorPermission> {
    let current = get_permission(pool, id).await?;
    if current.status != PermissionStatus::Pending {
        return Err(DbError::InvalidOperation(format!(
            "licença já {}",
            current.status
        )));
    }

    let start = patch.start_date.unwrap_or(current.start_date);
    let end = patch.end_date.unwrap_or(current.end_date);
    if start > end {
        return Err(DbError::InvalidOperation(
            "a data inicial deve ser anterior ou igual à final".to_string(),
        ));
    }

    sqlx::query(
        "UPDATE doctor_permissions SET start_date = ?, end_date = ?, reason = COALESCE(?, reason), updated_at = ? \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(start)
    .bind(end)
    .bind(patch.reason.as_deref().map(str::trim))
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    get_permission(pool, id).await
}

/// Decide uma licença pendente (`Approved` ou `Rejected`)
pub async fn decide_permission(
    pool: &SqlitePool,
    id: Uuid,
    decision: PermissionStatus,
) -> DbResult<DoctorPermission> {
    if decision == PermissionStatus::Pending {
        return Err(DbError::InvalidOperation(
            "decisão deve ser aprovar ou rejeitar".to_string(),
        ));
    }

    let result = sqlx::query(
        "UPDATE doctor_permissions SET status = ?, updated_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(decision)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let current = get_permission(pool, id).await?;
        return Err(DbError::InvalidOperation(format!(
            "licença já {}",
            current.status
        )));
    }

    info!(permission_id = %id, status = %decision, "Licença decidida");
    get_permission(pool, id).await
}

pub async fn delete_permission(pool: &SqlitePool, id: Uuid) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM doctor_permissions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("licença", id));
    }
    Ok(())
}
