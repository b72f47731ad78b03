use chrono::{Duration, Local, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::{local_day_start, paginate};
use crate::error::{DbError, DbResult};
use crate::models::{NewPayment, Page, Paginated, Payment, PaymentFilter, PaymentUpdate};

const COLUMNS: &str =
    "id, patient_id, appointment_id, amount_cents, method, paid_at, concept, created_at, updated_at";

/// O pagamento só pode referenciar uma consulta do mesmo paciente
async fn ensure_appointment_of(
    conn: &mut SqliteConnection,
    appointment_id: Uuid,
    patient_id: Uuid,
) -> DbResult<()> {
    let owner: Option<Uuid> = sqlx::query_scalar("SELECT patient_id FROM appointments WHERE id = ?")
        .bind(appointment_id)
        .fetch_optional(conn)
        .await?;
    match owner {
        None => Err(DbError::not_found("consulta", appointment_id)),
        Some(owner) if owner != patient_id => Err(DbError::InvalidOperation(
            "a consulta pertence a outro paciente".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

pub async fn create(pool: &SqlitePool, new: &NewPayment) -> DbResult<Payment> {
    let mut conn = pool.acquire().await?;

    let patient_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM patients WHERE id = ?")
        .bind(new.patient_id)
        .fetch_optional(&mut *conn)
        .await?;
    if patient_exists.is_none() {
        return Err(DbError::not_found("paciente", new.patient_id));
    }
    if let Some(appointment_id) = new.appointment_id {
        ensure_appointment_of(&mut conn, appointment_id, new.patient_id).await?;
    }

    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO payments (id, patient_id, appointment_id, amount_cents, method, paid_at, concept, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(new.patient_id)
    .bind(new.appointment_id)
    .bind(new.amount_cents)
    .bind(new.method)
    .bind(new.paid_at.unwrap_or(now))
    .bind(&new.concept)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    info!(
        payment_id = %id,
        patient_id = %new.patient_id,
        amount_cents = new.amount_cents,
        method = %new.method,
        "Pagamento registrado"
    );
    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> DbResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!("SELECT {} FROM payments WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("pagamento", id))
}

/// Pagamentos mais recentes primeiro
pub async fn list(pool: &SqlitePool, filter: &PaymentFilter, page: Page) -> DbResult<Paginated<Payment>> {
    paginate(pool, COLUMNS, "payments", "paid_at DESC", page, |qb| {
        if let Some(patient_id) = filter.patient_id {
            qb.push(" AND patient_id = ").push_bind(patient_id);
        }
        if let Some(appointment_id) = filter.appointment_id {
            qb.push(" AND appointment_id = ").push_bind(appointment_id);
        }
        if let Some(method) = filter.method {
            qb.push(" AND method = ").push_bind(method);
        }
        if let Some(from) = filter.from {
            qb.push(" AND paid_at >= ").push_bind(local_day_start(&Local, from));
        }
        if let Some(to) = filter.to {
            qb.push(" AND paid_at < ")
                .push_bind(local_day_start(&Local, to + Duration::days(1)));
        }
    })
    .await
}

pub async fn update(pool: &SqlitePool, id: Uuid, patch: &PaymentUpdate) -> DbResult<Payment> {
    let mut tx = pool.begin().await?;

    let patient_id: Option<Uuid> = sqlx::query_scalar("SELECT patient_id FROM payments WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let patient_id = patient_id.ok_or_else(|| DbError::not_found("pagamento", id))?;
    if let Some(appointment_id) = patch.appointment_id {
        ensure_appointment_of(&mut tx, appointment_id, patient_id).await?;
    }

    sqlx::query(
        "UPDATE payments SET \
            appointment_id = COALESCE(?, appointment_id), \
            amount_cents = COALESCE(?, amount_cents), \
            method = COALESCE(?, method), \
            paid_at = COALESCE(?, paid_at), \
            concept = COALESCE(?, concept), \
            updated_at = ? \
         WHERE id = ?",
    )
    .bind(patch.appointment_id)
    .bind(patch.amount_cents)
    .bind(patch.method)
    .bind(patch.paid_at)
    .bind(&patch.concept)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    get(pool, id).await
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM payments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("pagamento", id));
    }
    info!(payment_id = %id, "Pagamento removido");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewAppointment, PaymentMethod};
    use crate::repo::appointments;
    use crate::testing::{self, next_monday_at, TestDb};
    use chrono::{TimeZone, Utc};

    fn cash(patient_id: Uuid, amount_cents: i64) -> NewPayment {
        NewPayment {
            patient_id,
            appointment_id: None,
            amount_cents,
            method: PaymentMethod::Cash,
            paid_at: None,
            concept: Some("Sinal".into()),
        }
    }

    #[tokio::test]
    async fn payment_must_match_appointment_patient() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let doctor = testing::doctor(&db.pool, "1000001").await?;
        testing::full_week_schedule(&db.pool, &doctor).await?;
        let owner = testing::patient(&db.pool, "2000002").await?;
        let stranger = testing::patient(&db.pool, "3000003").await?;
        let appointment = appointments::book(
            &db.pool,
            &NewAppointment {
                patient_id: owner.id,
                doctor_id: doctor.id,
                treatment_id: None,
                scheduled_at: next_monday_at(9, 0),
                reason: None,
                notes: None,
            },
        )
        .await?;

        let mut wrong = cash(stranger.id, 5_000);
        wrong.appointment_id = Some(appointment.id);
        assert!(matches!(
            create(&db.pool, &wrong).await,
            Err(DbError::InvalidOperation(_))
        ));

        let mut right = cash(owner.id, 5_000);
        right.appointment_id = Some(appointment.id);
        let payment = create(&db.pool, &right).await?;
        assert_eq!(payment.appointment_id, Some(appointment.id));

        // Remover a consulta mantém o pagamento, sem vínculo
        appointments::delete(&db.pool, appointment.id).await?;
        assert_eq!(get(&db.pool, payment.id).await?.appointment_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn list_filters_by_local_paid_date() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let patient = testing::patient(&db.pool, "2000002").await?;
        let local = |d: u32, m: u32, h: u32, min: u32| {
            Local
                .with_ymd_and_hms(2026, m, d, h, min, 0)
                .unwrap()
                .with_timezone(&Utc)
        };

        // Meia hora antes e meia hora depois da virada do mês na clínica
        let mut january = cash(patient.id, 10_000);
        january.paid_at = Some(local(31, 1, 23, 30));
        create(&db.pool, &january).await?;
        let mut february = cash(patient.id, 20_000);
        february.paid_at = Some(local(1, 2, 0, 30));
        february.method = PaymentMethod::Card;
        create(&db.pool, &february).await?;

        let first_of_february = list(
            &db.pool,
            &PaymentFilter {
                from: chrono::NaiveDate::from_ymd_opt(2026, 2, 1),
                to: chrono::NaiveDate::from_ymd_opt(2026, 2, 1),
                ..Default::default()
            },
            Page::default(),
        )
        .await?;
        assert_eq!(first_of_february.total, 1);
        assert_eq!(first_of_february.items[0].amount_cents, 20_000);

        let page = list(
            &db.pool,
            &PaymentFilter {
                from: chrono::NaiveDate::from_ymd_opt(2026, 1, 1),
                to: chrono::NaiveDate::from_ymd_opt(2026, 1, 31),
                ..Default::default()
            },
            Page::default(),
        )
        .await?;
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].amount_cents, 10_000);

        let cards = list(
            &db.pool,
            &PaymentFilter {
                method: Some(PaymentMethod::Card),
                ..Default::default()
            },
            Page::default(),
        )
        .await?;
        assert_eq!(cards.total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn patient_with_payments_cannot_be_deleted() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let patient = testing::patient(&db.pool, "2000002").await?;
        let payment = create(&db.pool, &cash(patient.id, 1_000)).await?;

        assert!(matches!(
            crate::repo::patients::delete(&db.pool, patient.id).await,
            Err(DbError::ConstraintViolation(_))
        ));

        let updated = update(
            &db.pool,
            payment.id,
            &PaymentUpdate {
                amount_cents: Some(1_500),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.amount_cents, 1_500);
        assert_eq!(updated.concept.as_deref(), Some("Sinal"));
        Ok(())
    }
}
