//! Relatórios gerenciais: receita, consultas, tratamentos e novos pacientes
//!
//! Os períodos são inclusivos nas duas pontas e interpretados como datas
//! locais da clínica. Pagamentos e cadastros guardam instantes UTC, então os
//! limites são convertidos pelo fuso local antes da consulta.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{AppointmentStatus, PaymentMethod};
use crate::repo::{local_day_start, local_days};

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub count: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_cents: i64,
    pub by_method: Vec<MethodTotal>,
    pub by_day: Vec<DayTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct StatusCount {
    pub status: AppointmentStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DoctorLoad {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub total: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentsReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total: i64,
    pub by_status: Vec<StatusCount>,
    pub by_doctor: Vec<DoctorLoad>,
}

/// Uso de um tratamento em consultas concluídas
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct TreatmentUsage {
    pub treatment_id: Uuid,
    pub name: String,
    pub completed: i64,
    pub billed_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentsReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub treatments: Vec<TreatmentUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthCount {
    pub month: u32,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPatientsReport {
    pub year: i32,
    pub total: i64,
    /// Sempre 12 entradas, meses sem cadastro com zero
    pub months: Vec<MonthCount>,
}

fn check_period(from: NaiveDate, to: NaiveDate) -> DbResult<()> {
    if from > to {
        return Err(DbError::InvalidOperation(format!(
            "período inválido: {} é posterior a {}",
            from, to
        )));
    }
    Ok(())
}

/// Receita recebida no período
pub async fn income(pool: &SqlitePool, from: NaiveDate, to: NaiveDate) -> DbResult<IncomeReport> {
    income_in(pool, &Local, from, to).await
}

async fn income_in<Tz: TimeZone>(
    pool: &SqlitePool,
    tz: &Tz,
    from: NaiveDate,
    to: NaiveDate,
) -> DbResult<IncomeReport> {
    check_period(from, to)?;
    let (start, end) = local_days(tz, from, to);

    let by_method = sqlx::query_as::<_, MethodTotal>(
        "SELECT method, COUNT(*) AS count, SUM(amount_cents) AS total_cents FROM payments \
         WHERE paid_at >= ? AND paid_at < ? \
         GROUP BY method ORDER BY total_cents DESC",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let paid: Vec<(DateTime<Utc>, i64)> =
        sqlx::query_as("SELECT paid_at, amount_cents FROM payments WHERE paid_at >= ? AND paid_at < ?")
            .bind(start)
            .bind(end)
            .fetch_all(pool)
            .await?;

    let mut days: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for (paid_at, cents) in paid {
        *days.entry(paid_at.with_timezone(tz).date_naive()).or_default() += cents;
    }
    let by_day = days
        .into_iter()
        .map(|(date, total_cents)| DayTotal { date, total_cents })
        .collect();

    Ok(IncomeReport {
        from,
        to,
        total_cents: by_method.iter().map(|m| m.total_cents).sum(),
        by_method,
        by_day,
    })
}

/// Consultas do período por status e por médico
pub async fn appointments(pool: &SqlitePool, from: NaiveDate, to: NaiveDate) -> DbResult<AppointmentsReport> {
    check_period(from, to)?;
    let start = from.and_time(NaiveTime::MIN);
    let end = (to + Duration::days(1)).and_time(NaiveTime::MIN);

    let by_status = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count FROM appointments \
         WHERE scheduled_at >= ? AND scheduled_at < ? \
         GROUP BY status ORDER BY status",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let by_doctor = sqlx::query_as::<_, DoctorLoad>(
        "SELECT d.id AS doctor_id, d.first_name || ' ' || d.last_name AS doctor_name, \
                COUNT(*) AS total, \
                SUM(CASE WHEN a.status = 'completed' THEN 1 ELSE 0 END) AS completed \
         FROM appointments a JOIN doctors d ON d.id = a.doctor_id \
         WHERE a.scheduled_at >= ? AND a.scheduled_at < ? \
         GROUP BY d.id ORDER BY total DESC, doctor_name",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(AppointmentsReport {
        from,
        to,
        total: by_status.iter().map(|s| s.count).sum(),
        by_status,
        by_doctor,
    })
}

/// Tratamentos realizados (consultas concluídas) e valor faturado pelo preço
/// atual do tratamento
pub async fn treatments(pool: &SqlitePool, from: NaiveDate, to: NaiveDate) -> DbResult<TreatmentsReport> {
    check_period(from, to)?;
    let start = from.and_time(NaiveTime::MIN);
    let end = (to + Duration::days(1)).and_time(NaiveTime::MIN);

    let treatments = sqlx::query_as::<_, TreatmentUsage>(
        "SELECT t.id AS treatment_id, t.name, COUNT(*) AS completed, \
                COUNT(*) * t.price_cents AS billed_cents \
         FROM appointments a JOIN treatments t ON t.id = a.treatment_id \
         WHERE a.status = 'completed' AND a.scheduled_at >= ? AND a.scheduled_at < ? \
         GROUP BY t.id ORDER BY completed DESC, t.name",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(TreatmentsReport { from, to, treatments })
}

/// Pacientes cadastrados por mês do ano
pub async fn new_patients(pool: &SqlitePool, year: i32) -> DbResult<NewPatientsReport> {
    new_patients_in(pool, &Local, year).await
}

async fn new_patients_in<Tz: TimeZone>(pool: &SqlitePool, tz: &Tz, year: i32) -> DbResult<NewPatientsReport> {
    let bounds = NaiveDate::from_ymd_opt(year, 1, 1).zip(NaiveDate::from_ymd_opt(year + 1, 1, 1));
    let (first, next) = bounds.ok_or_else(|| DbError::InvalidOperation(format!("ano inválido: {}", year)))?;

    let created: Vec<DateTime<Utc>> =
        sqlx::query_scalar("SELECT created_at FROM patients WHERE created_at >= ? AND created_at < ?")
            .bind(local_day_start(tz, first))
            .bind(local_day_start(tz, next))
            .fetch_all(pool)
            .await?;

    let mut rows: BTreeMap<u32, i64> = BTreeMap::new();
    for at in created {
        *rows.entry(at.with_timezone(tz).month()).or_default() += 1;
    }

    let months: Vec<MonthCount> = (1..=12u32)
        .map(|month| MonthCount {
            month,
            count: rows.get(&month).copied().unwrap_or(0),
        })
        .collect();

    Ok(NewPatientsReport {
        year,
        total: months.iter().map(|m| m.count).sum(),
        months,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewAppointment, NewPayment, NewTreatment};
    use crate::repo::{appointments as appts, medical, payments, treatments as treats};
    use crate::testing::{self, next_monday, next_monday_at, TestDb};
    use chrono::FixedOffset;

    fn payment(patient_id: Uuid, cents: i64, method: PaymentMethod, day: u32) -> NewPayment {
        NewPayment {
            patient_id,
            appointment_id: None,
            amount_cents: cents,
            method,
            paid_at: Some(Utc.with_ymd_and_hms(2026, 3, day, 15, 0, 0).unwrap()),
            concept: None,
        }
    }

    #[tokio::test]
    async fn income_groups_by_method_and_day() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let patient = testing::patient(&db.pool, "2000002").await?;
        payments::create(&db.pool, &payment(patient.id, 10_000, PaymentMethod::Cash, 2)).await?;
        payments::create(&db.pool, &payment(patient.id, 5_000, PaymentMethod::Card, 2)).await?;
        payments::create(&db.pool, &payment(patient.id, 2_500, PaymentMethod::Cash, 3)).await?;
        // Fora do período
        payments::create(&db.pool, &payment(patient.id, 99_000, PaymentMethod::Cash, 20)).await?;

        let report = income_in(
            &db.pool,
            &Utc,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
        )
        .await?;

        assert_eq!(report.total_cents, 17_500);
        assert_eq!(report.by_method[0].method, PaymentMethod::Cash);
        assert_eq!(report.by_method[0].count, 2);
        assert_eq!(report.by_method[0].total_cents, 12_500);
        assert_eq!(
            report.by_day,
            vec![
                DayTotal {
                    date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                    total_cents: 15_000
                },
                DayTotal {
                    date: NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
                    total_cents: 2_500
                },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn inverted_period_rejected() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let day = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert!(matches!(
            income(&db.pool, day, day - Duration::days(1)).await,
            Err(DbError::InvalidOperation(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn appointments_and_treatments_reports() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let doctor = testing::doctor(&db.pool, "1000001").await?;
        testing::full_week_schedule(&db.pool, &doctor).await?;
        let patient = testing::patient(&db.pool, "2000002").await?;
        let cleaning = treats::create(
            &db.pool,
            &NewTreatment {
                name: "Limpeza".into(),
                description: None,
                price_cents: 15_000,
                active: true,
            },
        )
        .await?;

        let mut booked = Vec::new();
        for hour in [8, 10, 12] {
            booked.push(
                appts::book(
                    &db.pool,
                    &NewAppointment {
                        patient_id: patient.id,
                        doctor_id: doctor.id,
                        treatment_id: Some(cleaning.id),
                        scheduled_at: next_monday_at(hour, 0),
                        reason: None,
                        notes: None,
                    },
                )
                .await?,
            );
        }
        appts::set_status(&db.pool, booked[2].id, AppointmentStatus::Canceled).await?;
        for appointment in &booked[..2] {
            medical::record_attention(
                &db.pool,
                &db.cipher,
                &crate::models::NewMedicalAttention {
                    appointment_id: appointment.id,
                    attended_at: None,
                    notes: crate::models::AttentionNotes {
                        diagnosis: "Tártaro".into(),
                        procedure: None,
                        prescription: None,
                        observations: None,
                    },
                    history: None,
                },
            )
            .await?;
        }

        let day = next_monday();
        let report = appointments(&db.pool, day, day).await?;
        assert_eq!(report.total, 3);
        assert!(report.by_status.contains(&StatusCount {
            status: AppointmentStatus::Completed,
            count: 2
        }));
        assert!(report.by_status.contains(&StatusCount {
            status: AppointmentStatus::Canceled,
            count: 1
        }));
        assert_eq!(report.by_doctor.len(), 1);
        assert_eq!(report.by_doctor[0].total, 3);
        assert_eq!(report.by_doctor[0].completed, 2);

        let usage = treatments(&db.pool, day, day).await?;
        assert_eq!(
            usage.treatments,
            vec![TreatmentUsage {
                treatment_id: cleaning.id,
                name: "Limpeza".into(),
                completed: 2,
                billed_cents: 30_000,
            }]
        );
        Ok(())
    }

    #[tokio::test]
    async fn new_patients_zero_fills_months() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        testing::patient(&db.pool, "2000002").await?;
        testing::patient(&db.pool, "3000003").await?;

        let now = Utc::now();
        let report = new_patients_in(&db.pool, &Utc, now.year()).await?;
        assert_eq!(report.months.len(), 12);
        assert_eq!(report.total, 2);
        assert_eq!(report.months[now.month0() as usize].count, 2);

        let empty = new_patients_in(&db.pool, &Utc, now.year() - 1).await?;
        assert_eq!(empty.total, 0);
        assert!(empty.months.iter().all(|m| m.count == 0));
        Ok(())
    }

    #[tokio::test]
    async fn evening_records_count_on_local_day() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let la_paz = FixedOffset::west_opt(4 * 3600).unwrap();
        let patient = testing::patient(&db.pool, "2000002").await?;

        // 22:00 de 1º de março em La Paz já é dia 2 em UTC
        let mut evening = payment(patient.id, 8_000, PaymentMethod::Transfer, 2);
        evening.paid_at = Some(Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).unwrap());
        payments::create(&db.pool, &evening).await?;

        let first = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let report = income_in(&db.pool, &la_paz, first, first).await?;
        assert_eq!(report.total_cents, 8_000);
        assert_eq!(
            report.by_day,
            vec![DayTotal {
                date: first,
                total_cents: 8_000
            }]
        );
        let next_day = income_in(&db.pool, &la_paz, first + Duration::days(1), first + Duration::days(1)).await?;
        assert_eq!(next_day.total_cents, 0);

        // Cadastro na noite de 31 de dezembro fica no ano que termina
        sqlx::query("UPDATE patients SET created_at = ? WHERE id = ?")
            .bind(Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap())
            .bind(patient.id)
            .execute(&db.pool)
            .await?;
        let previous = new_patients_in(&db.pool, &la_paz, 2025).await?;
        assert_eq!(previous.total, 1);
        assert_eq!(previous.months[11].count, 1);
        assert_eq!(new_patients_in(&db.pool, &la_paz, 2026).await?.total, 0);
        Ok(())
    }
}
