//! Consultas: agendamento com verificação de conflitos
//!
//! A verificação de agenda e a gravação acontecem na mesma transação, com o
//! lock de escrita obtido antes da leitura das consultas existentes.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use super::medical::refresh_history_counters;
use super::schedules::{approved_permissions_on, schedules_for_day};
use crate::error::{DbError, DbResult};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, AppointmentSummary, AppointmentUpdate,
    Availability, NewAppointment, Page, Paginated,
};
use crate::scheduling::{self, Candidate};

const COLUMNS: &str = "id, patient_id, doctor_id, treatment_id, scheduled_at, status, reason, notes, created_at, updated_at";

const SUMMARY_SELECT: &str = "a.id, a.patient_id, p.first_name || ' ' || p.last_name AS patient_name, \
    a.doctor_id, d.first_name || ' ' || d.last_name AS doctor_name, \
    a.treatment_id, t.name AS treatment_name, a.scheduled_at, a.status, a.reason";

const SUMMARY_FROM: &str = "appointments a \
    JOIN patients p ON p.id = a.patient_id \
    JOIN doctors d ON d.id = a.doctor_id \
    LEFT JOIN treatments t ON t.id = a.treatment_id";

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> DbResult<Appointment> {
    sqlx::query_as::<_, Appointment>(&format!("SELECT {} FROM appointments WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("consulta", id))
}

/// Consultas ativas do médico ou do paciente num intervalo de um dia ao redor
/// do horário; a varredura fina fica com `scheduling::find_conflict`.
async fn nearby_appointments(
    conn: &mut SqliteConnection,
    doctor_id: Uuid,
    patient_id: Uuid,
    around: NaiveDateTime,
) -> DbResult<Vec<Appointment>> {
    Ok(sqlx::query_as::<_, Appointment>(&format!(
        "SELECT {} FROM appointments \
         WHERE (doctor_id = ? OR patient_id = ?) AND status != 'canceled' \
           AND scheduled_at >= ? AND scheduled_at < ? \
         ORDER BY scheduled_at",
        COLUMNS
    ))
    .bind(doctor_id)
    .bind(patient_id)
    .bind(around - Duration::days(1))
    .bind(around + Duration::days(1))
    .fetch_all(conn)
    .await?)
}

/// Aplica as regras de agenda a um horário proposto
async fn ensure_slot_available(conn: &mut SqliteConnection, candidate: &Candidate) -> DbResult<()> {
    let date = candidate.start.date();

    if !approved_permissions_on(conn, candidate.doctor_id, date).await?.is_empty() {
        warn!(doctor_id = %candidate.doctor_id, %date, "Agendamento em dia de licença");
        return Err(DbError::ScheduleConflict(
            "o médico está de licença nesta data".to_string(),
        ));
    }

    let schedules = schedules_for_day(conn, candidate.doctor_id, scheduling::iso_weekday(date)).await?;
    if !scheduling::fits_work_schedule(candidate.start, &schedules) {
        warn!(doctor_id = %candidate.doctor_id, start = %candidate.start, "Horário fora do expediente");
        return Err(DbError::ScheduleConflict(format!(
            "o horário {} não cabe no expediente do médico ({} min por consulta)",
            candidate.start.format("%Y-%m-%d %H:%M"),
            scheduling::APPOINTMENT_BLOCK_MINUTES
        )));
    }

    let nearby =
        nearby_appointments(conn, candidate.doctor_id, candidate.patient_id, candidate.start).await?;
    if let Some(conflict) = scheduling::find_conflict(candidate, &nearby) {
        warn!(
            doctor_id = %candidate.doctor_id,
            patient_id = %candidate.patient_id,
            conflicting = %conflict.appointment_id,
            "Conflito de agenda"
        );
        return Err(DbError::ScheduleConflict(conflict.to_string()));
    }

    Ok(())
}

fn ensure_future(start: NaiveDateTime) -> DbResult<()> {
    if start <= Local::now().naive_local() {
        return Err(DbError::InvalidOperation(
            "não é possível agendar no passado".to_string(),
        ));
    }
    Ok(())
}

async fn ensure_doctor_active(conn: &mut SqliteConnection, doctor_id: Uuid) -> DbResult<()> {
    let active: Option<bool> = sqlx::query_scalar("SELECT active FROM doctors WHERE id = ?")
        .bind(doctor_id)
        .fetch_optional(conn)
        .await?;
    match active {
        None => Err(DbError::not_found("médico", doctor_id)),
        Some(false) => Err(DbError::InvalidOperation(
            "o médico está inativo".to_string(),
        )),
        Some(true) => Ok(()),
    }
}

async fn ensure_treatment_active(conn: &mut SqliteConnection, treatment_id: Uuid) -> DbResult<()> {
    let active: Option<bool> = sqlx::query_scalar("SELECT active FROM treatments WHERE id = ?")
        .bind(treatment_id)
        .fetch_optional(conn)
        .await?;
    match active {
        None => Err(DbError::not_found("tratamento", treatment_id)),
        Some(false) => Err(DbError::InvalidOperation(
            "o tratamento está inativo".to_string(),
        )),
        Some(true) => Ok(()),
    }
}

/// Agenda uma consulta
pub async fn book(pool: &SqlitePool, new: &NewAppointment) -> DbResult<Appointment> {
    ensure_future(new.scheduled_at)?;

    let mut tx = pool.begin().await?;

    if !super::lock_row(&mut tx, "patients", new.patient_id).await? {
        return Err(DbError::not_found("paciente", new.patient_id));
    }
    ensure_doctor_active(&mut tx, new.doctor_id).await?;
    if let Some(treatment_id) = new.treatment_id {
        ensure_treatment_active(&mut tx, treatment_id).await?;
    }

    let candidate = Candidate {
        appointment_id: None,
        patient_id: new.patient_id,
        doctor_id: new.doctor_id,
        start: new.scheduled_at,
    };
    ensure_slot_available(&mut tx, &candidate).await?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO appointments (id, patient_id, doctor_id, treatment_id, scheduled_at, status, reason, notes, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(new.patient_id)
    .bind(new.doctor_id)
    .bind(new.treatment_id)
    .bind(new.scheduled_at)
    .bind(AppointmentStatus::Scheduled)
    .bind(&new.reason)
    .bind(&new.notes)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let appointment = fetch(&mut tx, id).await?;
    tx.commit().await?;

    info!(
        appointment_id = %id,
        doctor_id = %new.doctor_id,
        scheduled_at = %new.scheduled_at,
        "Consulta agendada"
    );
    Ok(appointment)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> DbResult<Appointment> {
    let mut conn = pool.acquire().await?;
    fetch(&mut conn, id).await
}

pub async fn get_summary(pool: &SqlitePool, id: Uuid) -> DbResult<AppointmentSummary> {
    sqlx::query_as::<_, AppointmentSummary>(&format!(
        "SELECT {} FROM {} WHERE a.id = ?",
        SUMMARY_SELECT, SUMMARY_FROM
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("consulta", id))
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &AppointmentFilter) {
    if let Some(doctor_id) = filter.doctor_id {
        qb.push(" AND a.doctor_id = ").push_bind(doctor_id);
    }
    if let Some(patient_id) = filter.patient_id {
        qb.push(" AND a.patient_id = ").push_bind(patient_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND a.status = ").push_bind(status);
    }

    let (from, to) = match filter.date {
        Some(date) => (Some(date), Some(date)),
        None => (filter.from, filter.to),
    };
    if let Some(from) = from {
        qb.push(" AND a.scheduled_at >= ").push_bind(day_start(from));
    }
    if let Some(to) = to {
        qb.push(" AND a.scheduled_at < ").push_bind(day_start(to + Duration::days(1)));
    }
}

fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

/// Agenda filtrada, em ordem cronológica
pub async fn list(
    pool: &SqlitePool,
    filter: &AppointmentFilter,
    page: Page,
) -> DbResult<Paginated<AppointmentSummary>> {
    super::paginate(
        pool,
        SUMMARY_SELECT,
        SUMMARY_FROM,
        "a.scheduled_at, d.last_name",
        page,
        |qb| push_filters(qb, filter),
    )
    .await
}

/// Altera uma consulta agendada. Mudanças de médico ou horário passam de novo
/// pelas regras de agenda.
pub async fn update(pool: &SqlitePool, id: Uuid, patch: &AppointmentUpdate) -> DbResult<Appointment> {
    let mut tx = pool.begin().await?;

    if !super::lock_row(&mut tx, "appointments", id).await? {
        return Err(DbError::not_found("consulta", id));
    }
    let current = fetch(&mut tx, id).await?;

    if patch.touches_schedule() {
        if current.status != AppointmentStatus::Scheduled {
            return Err(DbError::InvalidOperation(format!(
                "consulta com status {} não pode ser remarcada",
                current.status
            )));
        }

        let candidate = Candidate {
            appointment_id: Some(id),
            patient_id: current.patient_id,
            doctor_id: patch.doctor_id.unwrap_or(current.doctor_id),
            start: patch.scheduled_at.unwrap_or(current.scheduled_at),
        };
        if patch.scheduled_at.is_some() {
            ensure_future(candidate.start)?;
        }
        if candidate.doctor_id != current.doctor_id {
            ensure_doctor_active(&mut tx, candidate.doctor_id).await?;
        }
        ensure_slot_available(&mut tx, &candidate).await?;
    }
    if let Some(treatment_id) = patch.treatment_id {
        ensure_treatment_active(&mut tx, treatment_id).await?;
    }

    sqlx::query(
        "UPDATE appointments SET \
            doctor_id = COALESCE(?, doctor_id), \
            treatment_id = COALESCE(?, treatment_id), \
            scheduled_at = COALESCE(?, scheduled_at), \
            reason = COALESCE(?, reason), \
            notes = COALESCE(?, notes), \
            updated_at = ? \
         WHERE id = ?",
    )
    .bind(patch.doctor_id)
    .bind(patch.treatment_id)
    .bind(patch.scheduled_at)
    .bind(&patch.reason)
    .bind(&patch.notes)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let updated = fetch(&mut tx, id).await?;
    tx.commit().await?;

    if patch.touches_schedule() {
        info!(appointment_id = %id, scheduled_at = %updated.scheduled_at, "Consulta remarcada");
    }
    Ok(updated)
}

/// Cancela ou marca falta. A conclusão só acontece pelo registro do atendimento.
pub async fn set_status(pool: &SqlitePool, id: Uuid, next: AppointmentStatus) -> DbResult<Appointment> {
    let mut tx = pool.begin().await?;

    if !super::lock_row(&mut tx, "appointments", id).await? {
        return Err(DbError::not_found("consulta", id));
    }
    let current = fetch(&mut tx, id).await?;
    if !current.status.can_transition_to(next) {
        return Err(DbError::InvalidOperation(format!(
            "transição de {} para {} não permitida",
            current.status, next
        )));
    }

    sqlx::query("UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?")
        .bind(next)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let updated = fetch(&mut tx, id).await?;
    tx.commit().await?;

    info!(appointment_id = %id, status = %next, "Status da consulta alterado");
    Ok(updated)
}

/// Remove a consulta; o atendimento cai em cascata e o histórico é recontado
pub async fn delete(pool: &SqlitePool, id: Uuid) -> DbResult<()> {
    let mut tx = pool.begin().await?;
    if !super::lock_row(&mut tx, "appointments", id).await? {
        return Err(DbError::not_found("consulta", id));
    }
    let appointment = fetch(&mut tx, id).await?;

    sqlx::query("DELETE FROM appointments WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    refresh_history_counters(&mut tx, appointment.patient_id).await?;
    tx.commit().await?;

    info!(appointment_id = %id, "Consulta removida");
    Ok(())
}

/// Horários livres de um médico numa data
pub async fn availability(pool: &SqlitePool, doctor_id: Uuid, date: NaiveDate) -> DbResult<Availability> {
    let mut conn = pool.acquire().await?;
    ensure_doctor_active(&mut conn, doctor_id).await?;

    let permissions = approved_permissions_on(&mut conn, doctor_id, date).await?;
    let schedules = schedules_for_day(&mut conn, doctor_id, scheduling::iso_weekday(date)).await?;
    let busy = sqlx::query_as::<_, Appointment>(&format!(
        "SELECT {} FROM appointments \
         WHERE doctor_id = ? AND status != 'canceled' AND scheduled_at >= ? AND scheduled_at < ?",
        COLUMNS
    ))
    .bind(doctor_id)
    .bind(day_start(date) - Duration::days(1))
    .bind(day_start(date) + Duration::days(2))
    .fetch_all(&mut *conn)
    .await?;

    let now = Local::now().naive_local();
    let slots = scheduling::free_slots(
        date,
        &schedules,
        &permissions,
        &busy,
        scheduling::SLOT_STEP_MINUTES,
    )
    .into_iter()
    .filter(|slot| *slot > now)
    .collect();

    Ok(Availability {
        doctor_id,
        date,
        on_leave: scheduling::on_leave(date, &permissions),
        slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewDoctorPermission, PermissionStatus};
    use crate::repo::schedules;
    use crate::testing::{self, next_monday_at, TestDb};

    struct Fixture {
        db: TestDb,
        doctor: crate::models::Doctor,
        patient: crate::models::Patient,
    }

    async fn fixture() -> anyhow::Result<Fixture> {
        let db = TestDb::new().await?;
        let doctor = testing::doctor(&db.pool, "1000001").await?;
        testing::full_week_schedule(&db.pool, &doctor).await?;
        let patient = testing::patient(&db.pool, "2000002").await?;
        Ok(Fixture { db, doctor, patient })
    }

    fn booking(doctor: Uuid, patient: Uuid, at: NaiveDateTime) -> NewAppointment {
        NewAppointment {
            patient_id: patient,
            doctor_id: doctor,
            treatment_id: None,
            scheduled_at: at,
            reason: Some("Dor no molar".into()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn booking_round_trip() -> anyhow::Result<()> {
        let f = fixture().await?;
        let at = next_monday_at(9, 0);
        let booked = book(&f.db.pool, &booking(f.doctor.id, f.patient.id, at)).await?;

        assert_eq!(booked.status, AppointmentStatus::Scheduled);
        assert_eq!(booked.scheduled_at, at);
        assert_eq!(get(&f.db.pool, booked.id).await?, booked);

        let summary = get_summary(&f.db.pool, booked.id).await?;
        assert_eq!(summary.patient_name, f.patient.full_name());
        assert_eq!(summary.doctor_name, f.doctor.full_name());
        Ok(())
    }

    #[tokio::test]
    async fn doctor_conflict_inside_ninety_minutes() -> anyhow::Result<()> {
        let f = fixture().await?;
        let other_patient = testing::patient(&f.db.pool, "3000003").await?;
        book(&f.db.pool, &booking(f.doctor.id, f.patient.id, next_monday_at(9, 0))).await?;

        let clash = book(
            &f.db.pool,
            &booking(f.doctor.id, other_patient.id, next_monday_at(10, 29)),
        )
        .await;
        assert!(matches!(clash, Err(DbError::ScheduleConflict(_))));

        book(
            &f.db.pool,
            &booking(f.doctor.id, other_patient.id, next_monday_at(10, 30)),
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn patient_cannot_be_in_two_places() -> anyhow::Result<()> {
        let f = fixture().await?;
        let other_doctor = testing::doctor(&f.db.pool, "4000004").await?;
        testing::full_week_schedule(&f.db.pool, &other_doctor).await?;
        book(&f.db.pool, &booking(f.doctor.id, f.patient.id, next_monday_at(9, 0))).await?;

        let clash = book(
            &f.db.pool,
            &booking(other_doctor.id, f.patient.id, next_monday_at(8, 0)),
        )
        .await;
        assert!(matches!(clash, Err(DbError::ScheduleConflict(_))));
        Ok(())
    }

    #[tokio::test]
    async fn canceled_appointment_frees_slot() -> anyhow::Result<()> {
        let f = fixture().await?;
        let first = book(&f.db.pool, &booking(f.doctor.id, f.patient.id, next_monday_at(9, 0))).await?;
        set_status(&f.db.pool, first.id, AppointmentStatus::Canceled).await?;

        book(&f.db.pool, &booking(f.doctor.id, f.patient.id, next_monday_at(9, 0))).await?;
        Ok(())
    }

    #[tokio::test]
    async fn outside_schedule_and_on_leave_rejected() -> anyhow::Result<()> {
        let f = fixture().await?;

        // 17:00 + 90 min passa do fim do expediente (18:00)
        let late = book(&f.db.pool, &booking(f.doctor.id, f.patient.id, next_monday_at(17, 0))).await;
        assert!(matches!(late, Err(DbError::ScheduleConflict(_))));

        let monday = testing::next_monday();
        let permission = schedules::create_permission(
            &f.db.pool,
            &NewDoctorPermission {
                doctor_id: f.doctor.id,
                start_date: monday,
                end_date: monday,
                reason: "Licença médica".into(),
            },
        )
        .await?;
        // Pendente ainda não bloqueia
        let booked = book(&f.db.pool, &booking(f.doctor.id, f.patient.id, next_monday_at(9, 0))).await?;
        set_status(&f.db.pool, booked.id, AppointmentStatus::Canceled).await?;

        schedules::decide_permission(&f.db.pool, permission.id, PermissionStatus::Approved).await?;
        let on_leave = book(&f.db.pool, &booking(f.doctor.id, f.patient.id, next_monday_at(9, 0))).await;
        assert!(matches!(on_leave, Err(DbError::ScheduleConflict(_))));
        Ok(())
    }

    #[tokio::test]
    async fn past_and_unknown_rejected() -> anyhow::Result<()> {
        let f = fixture().await?;
        let past = Local::now().naive_local() - Duration::days(1);
        assert!(matches!(
            book(&f.db.pool, &booking(f.doctor.id, f.patient.id, past)).await,
            Err(DbError::InvalidOperation(_))
        ));
        assert!(matches!(
            book(&f.db.pool, &booking(f.doctor.id, Uuid::new_v4(), next_monday_at(9, 0))).await,
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            book(&f.db.pool, &booking(Uuid::new_v4(), f.patient.id, next_monday_at(9, 0))).await,
            Err(DbError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn reschedule_checks_against_others_only() -> anyhow::Result<()> {
        let f = fixture().await?;
        let other_patient = testing::patient(&f.db.pool, "3000003").await?;
        let first = book(&f.db.pool, &booking(f.doctor.id, f.patient.id, next_monday_at(9, 0))).await?;
        book(
            &f.db.pool,
            &booking(f.doctor.id, other_patient.id, next_monday_at(12, 0)),
        )
        .await?;

        // Deslocar 30 minutos sobre a própria janela é permitido
        let moved = update(
            &f.db.pool,
            first.id,
            &AppointmentUpdate {
                scheduled_at: Some(next_monday_at(9, 30)),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(moved.scheduled_at, next_monday_at(9, 30));
        assert_eq!(moved.reason, first.reason);

        let clash = update(
            &f.db.pool,
            first.id,
            &AppointmentUpdate {
                scheduled_at: Some(next_monday_at(11, 0)),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(clash, Err(DbError::ScheduleConflict(_))));

        // Notas não passam pelas regras de agenda
        let noted = update(
            &f.db.pool,
            first.id,
            &AppointmentUpdate {
                notes: Some("Trazer radiografia".into()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(noted.notes.as_deref(), Some("Trazer radiografia"));
        assert_eq!(noted.scheduled_at, next_monday_at(9, 30));
        Ok(())
    }

    #[tokio::test]
    async fn status_transitions_enforced() -> anyhow::Result<()> {
        let f = fixture().await?;
        let booked = book(&f.db.pool, &booking(f.doctor.id, f.patient.id, next_monday_at(9, 0))).await?;

        assert!(matches!(
            set_status(&f.db.pool, booked.id, AppointmentStatus::Completed).await,
            Err(DbError::InvalidOperation(_))
        ));
        let missed = set_status(&f.db.pool, booked.id, AppointmentStatus::NoShow).await?;
        assert_eq!(missed.status, AppointmentStatus::NoShow);
        assert!(matches!(
            set_status(&f.db.pool, booked.id, AppointmentStatus::Canceled).await,
            Err(DbError::InvalidOperation(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn list_filters_by_day_and_doctor() -> anyhow::Result<()> {
        let f = fixture().await?;
        book(&f.db.pool, &booking(f.doctor.id, f.patient.id, next_monday_at(9, 0))).await?;
        book(
            &f.db.pool,
            &booking(f.doctor.id, f.patient.id, next_monday_at(9, 0) + Duration::days(1)),
        )
        .await?;

        let monday = list(
            &f.db.pool,
            &AppointmentFilter {
                doctor_id: Some(f.doctor.id),
                date: Some(testing::next_monday()),
                ..Default::default()
            },
            Page::default(),
        )
        .await?;
        assert_eq!(monday.total, 1);
        assert_eq!(monday.items[0].scheduled_at, next_monday_at(9, 0));

        let week = list(
            &f.db.pool,
            &AppointmentFilter {
                patient_id: Some(f.patient.id),
                from: Some(testing::next_monday()),
                to: Some(testing::next_monday() + Duration::days(6)),
                ..Default::default()
            },
            Page::default(),
        )
        .await?;
        assert_eq!(week.total, 2);
        Ok(())
    }

    #[tokio::test]
    async fn availability_excludes_booked_window() -> anyhow::Result<()> {
        let f = fixture().await?;
        book(&f.db.pool, &booking(f.doctor.id, f.patient.id, next_monday_at(9, 0))).await?;

        let free = availability(&f.db.pool, f.doctor.id, testing::next_monday()).await?;
        assert!(!free.on_leave);
        assert!(free.slots.contains(&next_monday_at(10, 30)));
        assert!(!free.slots.contains(&next_monday_at(8, 0)));
        assert!(!free.slots.contains(&next_monday_at(9, 30)));
        // Última partida possível: 16:30 (+90 = 18:00)
        assert_eq!(free.slots.last(), Some(&next_monday_at(16, 30)));
        Ok(())
    }
}
