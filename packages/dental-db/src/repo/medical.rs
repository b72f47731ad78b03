//! Histórico clínico e atendimentos médicos
//!
//! As anotações são gravadas cifradas (`notes_ciphertext` + `notes_nonce`).
//! Registrar ou remover um atendimento mexe em três tabelas (atendimento,
//! consulta e histórico) sempre dentro de uma única transação.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use super::appointments;
use crate::crypto::{EncryptedData, FieldCipher};
use crate::error::{DbError, DbResult};
use crate::models::{
    AppointmentStatus, AttentionNotes, ClinicalNotes, MedicalAttention, MedicalAttentionFilter,
    MedicalAttentionUpdate, MedicalHistory, MedicalHistoryUpdate, NewMedicalAttention,
    NewMedicalHistory, Page, Paginated,
};

const HISTORY_COLUMNS: &str = "id, patient_id, notes_ciphertext, notes_nonce, attention_count, last_attention_at, created_at, updated_at";
const ATTENTION_COLUMNS: &str = "id, appointment_id, patient_id, doctor_id, attended_at, notes_ciphertext, notes_nonce, created_at, updated_at";

#[derive(FromRow)]
struct HistoryRow {
    id: Uuid,
    patient_id: Uuid,
    notes_ciphertext: Vec<u8>,
    notes_nonce: Vec<u8>,
    attention_count: i64,
    last_attention_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl HistoryRow {
    fn open(self, cipher: &FieldCipher) -> DbResult<MedicalHistory> {
        let notes = cipher.open_json(&EncryptedData {
            ciphertext: self.notes_ciphertext,
            nonce: self.notes_nonce,
        })?;
        Ok(MedicalHistory {
            id: self.id,
            patient_id: self.patient_id,
            notes,
            attention_count: self.attention_count,
            last_attention_at: self.last_attention_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AttentionRow {
    id: Uuid,
    appointment_id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    attended_at: DateTime<Utc>,
    notes_ciphertext: Vec<u8>,
    notes_nonce: Vec<u8>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AttentionRow {
    fn open(self, cipher: &FieldCipher) -> DbResult<MedicalAttention> {
        let notes = cipher.open_json(&EncryptedData {
            ciphertext: self.notes_ciphertext,
            nonce: self.notes_nonce,
        })?;
        Ok(MedicalAttention {
            id: self.id,
            appointment_id: self.appointment_id,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            attended_at: self.attended_at,
            notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Histórico clínico
// ---------------------------------------------------------------------------

async fn history_row(conn: &mut SqliteConnection, id: Uuid) -> DbResult<HistoryRow> {
    sqlx::query_as::<_, HistoryRow>(&format!(
        "SELECT {} FROM medical_histories WHERE id = ?",
        HISTORY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("histórico", id))
}

async fn history_row_for_patient(
    conn: &mut SqliteConnection,
    patient_id: Uuid,
) -> DbResult<Option<HistoryRow>> {
    Ok(sqlx::query_as::<_, HistoryRow>(&format!(
        "SELECT {} FROM medical_histories WHERE patient_id = ?",
        HISTORY_COLUMNS
    ))
    .bind(patient_id)
    .fetch_optional(conn)
    .await?)
}

async fn insert_history(
    conn: &mut SqliteConnection,
    cipher: &FieldCipher,
    patient_id: Uuid,
    notes: &ClinicalNotes,
) -> DbResult<Uuid> {
    let sealed = cipher.seal_json(notes)?;
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO medical_histories (id, patient_id, notes_ciphertext, notes_nonce, attention_count, last_attention_at, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 0, NULL, ?, ?)",
    )
    .bind(id)
    .bind(patient_id)
    .bind(&sealed.ciphertext)
    .bind(&sealed.nonce)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(id)
}

async fn write_history_notes(
    conn: &mut SqliteConnection,
    cipher: &FieldCipher,
    id: Uuid,
    notes: &ClinicalNotes,
) -> DbResult<()> {
    let sealed = cipher.seal_json(notes)?;
    sqlx::query(
        "UPDATE medical_histories SET notes_ciphertext = ?, notes_nonce = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&sealed.ciphertext)
    .bind(&sealed.nonce)
    .bind(Utc::now())
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Cria o histórico de um paciente (um por paciente)
pub async fn create_history(
    pool: &SqlitePool,
    cipher: &FieldCipher,
    new: &NewMedicalHistory,
) -> DbResult<MedicalHistory> {
    let mut tx = pool.begin().await?;

    if !super::lock_row(&mut tx, "patients", new.patient_id).await? {
        return Err(DbError::not_found("paciente", new.patient_id));
    }
    if history_row_for_patient(&mut tx, new.patient_id).await?.is_some() {
        return Err(DbError::ConstraintViolation(
            "o paciente já possui histórico clínico".to_string(),
        ));
    }
    let id = insert_history(&mut tx, cipher, new.patient_id, &new.notes).await?;
    let history = history_row(&mut tx, id).await?.open(cipher)?;
    tx.commit().await?;

    info!(history_id = %id, patient_id = %new.patient_id, "Histórico clínico criado");
    Ok(history)
}

pub async fn get_history(pool: &SqlitePool, cipher: &FieldCipher, id: Uuid) -> DbResult<MedicalHistory> {
    let mut conn = pool.acquire().await?;
    history_row(&mut conn, id).await?.open(cipher)
}

pub async fn get_history_by_patient(
    pool: &SqlitePool,
    cipher: &FieldCipher,
    patient_id: Uuid,
) -> DbResult<MedicalHistory> {
    let mut conn = pool.acquire().await?;
    history_row_for_patient(&mut conn, patient_id)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("histórico do paciente {}", patient_id)))?
        .open(cipher)
}

/// Cria o histórico se ainda não existe e mescla as anotações informadas
pub async fn upsert_history_for_patient(
    pool: &SqlitePool,
    cipher: &FieldCipher,
    patient_id: Uuid,
    patch: ClinicalNotes,
) -> DbResult<MedicalHistory> {
    let mut tx = pool.begin().await?;

    if !super::lock_row(&mut tx, "patients", patient_id).await? {
        return Err(DbError::not_found("paciente", patient_id));
    }
    let id = merge_into_history(&mut tx, cipher, patient_id, Some(patch)).await?;
    let history = history_row(&mut tx, id).await?.open(cipher)?;
    tx.commit().await?;
    Ok(history)
}

async fn merge_into_history(
    conn: &mut SqliteConnection,
    cipher: &FieldCipher,
    patient_id: Uuid,
    patch: Option<ClinicalNotes>,
) -> DbResult<Uuid> {
    match history_row_for_patient(conn, patient_id).await? {
        Some(row) => {
            let id = row.id;
            if let Some(patch) = patch {
                let mut history = row.open(cipher)?;
                history.notes.merge(patch);
                write_history_notes(conn, cipher, id, &history.notes).await?;
            }
            Ok(id)
        }
        None => insert_history(conn, cipher, patient_id, &patch.unwrap_or_default()).await,
    }
}

pub async fn list_histories(
    pool: &SqlitePool,
    cipher: &FieldCipher,
    page: Page,
) -> DbResult<Paginated<MedicalHistory>> {
    let rows: Paginated<HistoryRow> = super::paginate(
        pool,
        HISTORY_COLUMNS,
        "medical_histories",
        "updated_at DESC",
        page,
        |_| {},
    )
    .await?;

    Ok(Paginated {
        items: rows
            .items
            .into_iter()
            .map(|row| row.open(cipher))
            .collect::<DbResult<_>>()?,
        total: rows.total,
        limit: rows.limit,
        offset: rows.offset,
    })
}

pub async fn update_history(
    pool: &SqlitePool,
    cipher: &FieldCipher,
    id: Uuid,
    patch: &MedicalHistoryUpdate,
) -> DbResult<MedicalHistory> {
    let mut tx = pool.begin().await?;

    if !super::lock_row(&mut tx, "medical_histories", id).await? {
        return Err(DbError::not_found("histórico", id));
    }
    let mut history = history_row(&mut tx, id).await?.open(cipher)?;
    history.notes.merge(patch.notes.clone());
    write_history_notes(&mut tx, cipher, id, &history.notes).await?;
    let history = history_row(&mut tx, id).await?.open(cipher)?;
    tx.commit().await?;

    Ok(history)
}

pub async fn delete_history(pool: &SqlitePool, id: Uuid) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM medical_histories WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("histórico", id));
    }
    info!(history_id = %id, "Histórico clínico removido");
    Ok(())
}

/// Recalcula contagem e data do último atendimento a partir dos atendimentos
/// existentes
pub(crate) async fn refresh_history_counters(conn: &mut SqliteConnection, patient_id: Uuid) -> DbResult<()> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM medical_attentions WHERE patient_id = ?")
            .bind(patient_id)
            .fetch_one(&mut *conn)
            .await?;
    let last: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT attended_at FROM medical_attentions WHERE patient_id = ? ORDER BY attended_at DESC LIMIT 1",
    )
    .bind(patient_id)
    .fetch_optional(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE medical_histories SET attention_count = ?, last_attention_at = ?, updated_at = ? WHERE patient_id = ?",
    )
    .bind(count)
    .bind(last)
    .bind(Utc::now())
    .bind(patient_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Atendimentos
// ---------------------------------------------------------------------------

async fn attention_row(conn: &mut SqliteConnection, id: Uuid) -> DbResult<AttentionRow> {
    sqlx::query_as::<_, AttentionRow>(&format!(
        "SELECT {} FROM medical_attentions WHERE id = ?",
        ATTENTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("atendimento", id))
}

/// Registra o atendimento de uma consulta agendada.
///
/// Na mesma transação: grava o atendimento, conclui a consulta, cria o
/// histórico do paciente se preciso (mesclando `new.history`) e atualiza os
/// contadores do histórico. Qualquer falha desfaz tudo.
pub async fn record_attention(
    pool: &SqlitePool,
    cipher: &FieldCipher,
    new: &NewMedicalAttention,
) -> DbResult<MedicalAttention> {
    let mut tx = pool.begin().await?;

    if !super::lock_row(&mut tx, "appointments", new.appointment_id).await? {
        return Err(DbError::not_found("consulta", new.appointment_id));
    }
    let appointment = appointments::fetch(&mut tx, new.appointment_id).await?;
    if appointment.status != AppointmentStatus::Scheduled {
        warn!(
            appointment_id = %appointment.id,
            status = %appointment.status,
            "Atendimento para consulta não agendada"
        );
        return Err(DbError::InvalidOperation(format!(
            "consulta com status {} não pode receber atendimento",
            appointment.status
        )));
    }

    let id = Uuid::new_v4();
    let now = Utc::now();
    let attended_at = new.attended_at.unwrap_or(now);
    let sealed = cipher.seal_json(&new.notes)?;
    sqlx::query(
        "INSERT INTO medical_attentions (id, appointment_id, patient_id, doctor_id, attended_at, notes_ciphertext, notes_nonce, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(appointment.id)
    .bind(appointment.patient_id)
    .bind(appointment.doctor_id)
    .bind(attended_at)
    .bind(&sealed.ciphertext)
    .bind(&sealed.nonce)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?")
        .bind(AppointmentStatus::Completed)
        .bind(now)
        .bind(appointment.id)
        .execute(&mut *tx)
        .await?;

    merge_into_history(&mut tx, cipher, appointment.patient_id, new.history.clone()).await?;
    refresh_history_counters(&mut tx, appointment.patient_id).await?;

    let attention = attention_row(&mut tx, id).await?.open(cipher)?;
    tx.commit().await?;

    info!(
        attention_id = %id,
        appointment_id = %appointment.id,
        patient_id = %appointment.patient_id,
        "Atendimento registrado"
    );
    Ok(attention)
}

pub async fn get_attention(pool: &SqlitePool, cipher: &FieldCipher, id: Uuid) -> DbResult<MedicalAttention> {
    let mut conn = pool.acquire().await?;
    attention_row(&mut conn, id).await?.open(cipher)
}

/// Atendimentos mais recentes primeiro
pub async fn list_attentions(
    pool: &SqlitePool,
    cipher: &FieldCipher,
    filter: &MedicalAttentionFilter,
    page: Page,
) -> DbResult<Paginated<MedicalAttention>> {
    let rows: Paginated<AttentionRow> = super::paginate(
        pool,
        ATTENTION_COLUMNS,
        "medical_attentions",
        "attended_at DESC",
        page,
        |qb| {
            if let Some(patient_id) = filter.patient_id {
                qb.push(" AND patient_id = ").push_bind(patient_id);
            }
            if let Some(doctor_id) = filter.doctor_id {
                qb.push(" AND doctor_id = ").push_bind(doctor_id);
            }
        },
    )
    .await?;

    Ok(Paginated {
        items: rows
            .items
            .into_iter()
            .map(|row| row.open(cipher))
            .collect::<DbResult<_>>()?,
        total: rows.total,
        limit: rows.limit,
        offset: rows.offset,
    })
}

/// Altera anotações e/ou data do atendimento
pub async fn update_attention(
    pool: &SqlitePool,
    cipher: &FieldCipher,
    id: Uuid,
    patch: &MedicalAttentionUpdate,
) -> DbResult<MedicalAttention> {
    let mut tx = pool.begin().await?;

    if !super::lock_row(&mut tx, "medical_attentions", id).await? {
        return Err(DbError::not_found("atendimento", id));
    }
    let mut attention = attention_row(&mut tx, id).await?.open(cipher)?;
    attention.notes.apply(patch.notes.clone());
    let attended_at = patch.attended_at.unwrap_or(attention.attended_at);
    let sealed = cipher.seal_json(&attention.notes)?;

    sqlx::query(
        "UPDATE medical_attentions SET attended_at = ?, notes_ciphertext = ?, notes_nonce = ?, updated_at = ? WHERE id = ?",
    )
    .bind(attended_at)
    .bind(&sealed.ciphertext)
    .bind(&sealed.nonce)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;
    if patch.attended_at.is_some() {
        refresh_history_counters(&mut tx, attention.patient_id).await?;
    }

    let updated = attention_row(&mut tx, id).await?.open(cipher)?;
    tx.commit().await?;
    Ok(updated)
}

/// Remove o atendimento, devolve a consulta ao status agendado e recalcula os
/// contadores do histórico
pub async fn delete_attention(pool: &SqlitePool, id: Uuid) -> DbResult<()> {
    let mut tx = pool.begin().await?;

    let owner: Option<(Uuid, Uuid)> =
        sqlx::query_as("SELECT appointment_id, patient_id FROM medical_attentions WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let (appointment_id, patient_id) = owner.ok_or_else(|| DbError::not_found("atendimento", id))?;

    super::lock_row(&mut tx, "appointments", appointment_id).await?;
    sqlx::query("DELETE FROM medical_attentions WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE appointments SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(AppointmentStatus::Scheduled)
        .bind(Utc::now())
        .bind(appointment_id)
        .bind(AppointmentStatus::Completed)
        .execute(&mut *tx)
        .await?;
    refresh_history_counters(&mut tx, patient_id).await?;
    tx.commit().await?;

    info!(attention_id = %id, appointment_id = %appointment_id, "Atendimento removido");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Appointment, NewAppointment};
    use crate::testing::{self, next_monday_at, TestDb};

    async fn scheduled(db: &TestDb, patient_ci: &str) -> anyhow::Result<Appointment> {
        let doctor = testing::doctor(&db.pool, &format!("9{}", patient_ci)).await?;
        testing::full_week_schedule(&db.pool, &doctor).await?;
        let patient = testing::patient(&db.pool, patient_ci).await?;
        Ok(appointments::book(
            &db.pool,
            &NewAppointment {
                patient_id: patient.id,
                doctor_id: doctor.id,
                treatment_id: None,
                scheduled_at: next_monday_at(9, 0),
                reason: Some("Revisão".into()),
                notes: None,
            },
        )
        .await?)
    }

    fn attention_for(appointment: &Appointment) -> NewMedicalAttention {
        NewMedicalAttention {
            appointment_id: appointment.id,
            attended_at: None,
            notes: AttentionNotes {
                diagnosis: "Cárie oclusal no 36".into(),
                procedure: Some("Restauração em resina".into()),
                prescription: None,
                observations: None,
            },
            history: Some(ClinicalNotes {
                allergies: Some("Penicilina".into()),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn recording_attention_syncs_appointment_and_history() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let appointment = scheduled(&db, "2000002").await?;

        let attention = record_attention(&db.pool, &db.cipher, &attention_for(&appointment)).await?;
        assert_eq!(attention.patient_id, appointment.patient_id);
        assert_eq!(attention.doctor_id, appointment.doctor_id);
        assert_eq!(attention.notes.diagnosis, "Cárie oclusal no 36");

        let completed = appointments::get(&db.pool, appointment.id).await?;
        assert_eq!(completed.status, AppointmentStatus::Completed);

        let history = get_history_by_patient(&db.pool, &db.cipher, appointment.patient_id).await?;
        assert_eq!(history.attention_count, 1);
        assert_eq!(history.last_attention_at, Some(attention.attended_at));
        assert_eq!(history.notes.allergies.as_deref(), Some("Penicilina"));

        // Segunda tentativa: a consulta já foi concluída
        assert!(matches!(
            record_attention(&db.pool, &db.cipher, &attention_for(&appointment)).await,
            Err(DbError::InvalidOperation(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn notes_are_not_stored_in_clear() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let appointment = scheduled(&db, "2000002").await?;
        record_attention(&db.pool, &db.cipher, &attention_for(&appointment)).await?;

        let (ciphertext,): (Vec<u8>,) =
            sqlx::query_as("SELECT notes_ciphertext FROM medical_attentions")
                .fetch_one(&db.pool)
                .await?;
        let haystack = String::from_utf8_lossy(&ciphertext);
        assert!(!haystack.contains("Cárie"));
        Ok(())
    }

    #[tokio::test]
    async fn failed_recording_leaves_no_trace() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let appointment = scheduled(&db, "2000002").await?;
        appointments::set_status(&db.pool, appointment.id, AppointmentStatus::Canceled).await?;

        assert!(record_attention(&db.pool, &db.cipher, &attention_for(&appointment))
            .await
            .is_err());
        assert!(matches!(
            get_history_by_patient(&db.pool, &db.cipher, appointment.patient_id).await,
            Err(DbError::NotFound(_))
        ));
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM medical_attentions")
            .fetch_one(&db.pool)
            .await?;
        assert_eq!(count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn deleting_attention_reverts_appointment() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let appointment = scheduled(&db, "2000002").await?;
        let attention = record_attention(&db.pool, &db.cipher, &attention_for(&appointment)).await?;

        delete_attention(&db.pool, attention.id).await?;

        let reverted = appointments::get(&db.pool, appointment.id).await?;
        assert_eq!(reverted.status, AppointmentStatus::Scheduled);
        let history = get_history_by_patient(&db.pool, &db.cipher, appointment.patient_id).await?;
        assert_eq!(history.attention_count, 0);
        assert_eq!(history.last_attention_at, None);
        // O conteúdo clínico do histórico permanece
        assert_eq!(history.notes.allergies.as_deref(), Some("Penicilina"));
        assert!(matches!(
            get_attention(&db.pool, &db.cipher, attention.id).await,
            Err(DbError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn deleting_completed_appointment_recounts_history() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let appointment = scheduled(&db, "2000002").await?;
        record_attention(&db.pool, &db.cipher, &attention_for(&appointment)).await?;

        appointments::delete(&db.pool, appointment.id).await?;

        let (left,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM medical_attentions")
            .fetch_one(&db.pool)
            .await?;
        assert_eq!(left, 0);
        let history = get_history_by_patient(&db.pool, &db.cipher, appointment.patient_id).await?;
        assert_eq!(history.attention_count, 0);
        assert_eq!(history.last_attention_at, None);
        assert!(matches!(
            appointments::delete(&db.pool, appointment.id).await,
            Err(DbError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn update_attention_patches_notes() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let appointment = scheduled(&db, "2000002").await?;
        let attention = record_attention(&db.pool, &db.cipher, &attention_for(&appointment)).await?;

        let updated = update_attention(
            &db.pool,
            &db.cipher,
            attention.id,
            &MedicalAttentionUpdate {
                attended_at: None,
                notes: crate::models::AttentionNotesPatch {
                    prescription: Some("Ibuprofeno 400mg".into()),
                    ..Default::default()
                },
            },
        )
        .await?;
        assert_eq!(updated.notes.diagnosis, attention.notes.diagnosis);
        assert_eq!(updated.notes.prescription.as_deref(), Some("Ibuprofeno 400mg"));

        let listed = list_attentions(
            &db.pool,
            &db.cipher,
            &MedicalAttentionFilter {
                patient_id: Some(appointment.patient_id),
                doctor_id: None,
            },
            Page::default(),
        )
        .await?;
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0], updated);
        Ok(())
    }

    #[tokio::test]
    async fn history_is_unique_per_patient_and_merges() -> anyhow::Result<()> {
        let db = TestDb::new().await?;
        let patient = testing::patient(&db.pool, "2000002").await?;
        let created = create_history(
            &db.pool,
            &db.cipher,
            &NewMedicalHistory {
                patient_id: patient.id,
                notes: ClinicalNotes {
                    current_medication: Some("Losartana".into()),
                    ..Default::default()
                },
            },
        )
        .await?;
        assert_eq!(created.attention_count, 0);

        assert!(matches!(
            create_history(
                &db.pool,
                &db.cipher,
                &NewMedicalHistory {
                    patient_id: patient.id,
                    notes: ClinicalNotes::default(),
                },
            )
            .await,
            Err(DbError::ConstraintViolation(_))
        ));

        let merged = upsert_history_for_patient(
            &db.pool,
            &db.cipher,
            patient.id,
            ClinicalNotes {
                allergies: Some("Látex".into()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(merged.id, created.id);
        assert_eq!(merged.notes.current_medication.as_deref(), Some("Losartana"));
        assert_eq!(merged.notes.allergies.as_deref(), Some("Látex"));

        let page = list_histories(&db.pool, &db.cipher, Page::default()).await?;
        assert_eq!(page.total, 1);

        delete_history(&db.pool, created.id).await?;
        assert!(matches!(
            get_history(&db.pool, &db.cipher, created.id).await,
            Err(DbError::NotFound(_))
        ));
        Ok(())
    }
}
