//! Utilitários de teste: banco temporário e dados de exemplo
//!
//! Disponível nos testes da própria biblioteca e, com a feature
//! `test-utils`, para os testes de outros crates.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::crypto::{EncryptionKey, FieldCipher};
use crate::models::{Doctor, NewDoctor, NewPatient, NewWorkSchedule, Patient, WorkSchedule};
use crate::repo;
use crate::{init_db_pool, Database, DbConfig};

/// Banco SQLite num diretório temporário, removido ao sair de escopo
pub struct TestDb {
    pub pool: SqlitePool,
    pub cipher: Arc<FieldCipher>,
    _dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let config = DbConfig {
            db_path: dir.path().join("dental-test.db").display().to_string(),
            key_phrase: "frase-de-teste".to_string(),
            max_connections: 4,
            trace_level: 0,
        };
        let pool = init_db_pool(&config).await?;
        Ok(Self {
            pool,
            cipher: Arc::new(FieldCipher::new(EncryptionKey::generate())),
            _dir: dir,
        })
    }

    /// Mesmo banco visto como `Database` (pool + cifra)
    pub fn database(&self) -> Database {
        Database {
            pool: self.pool.clone(),
            cipher: self.cipher.clone(),
        }
    }
}

pub fn new_patient(ci: &str) -> NewPatient {
    NewPatient {
        ci: ci.to_string(),
        first_name: "Paciente".to_string(),
        last_name: format!("Teste {}", ci),
        email: Some(format!("paciente{}@example.com", ci)),
        phone: Some("70000000".to_string()),
        birth_date: NaiveDate::from_ymd_opt(1990, 3, 14),
        gender: None,
        address: None,
    }
}

pub fn new_doctor(ci: &str) -> NewDoctor {
    NewDoctor {
        ci: ci.to_string(),
        first_name: "Dra.".to_string(),
        last_name: format!("Teste {}", ci),
        email: format!("doutor{}@example.com", ci),
        phone: None,
        specialty: Some("Ortodontia".to_string()),
        active: true,
    }
}

pub async fn patient(pool: &SqlitePool, ci: &str) -> Result<Patient> {
    Ok(repo::patients::create(pool, &new_patient(ci)).await?)
}

pub async fn doctor(pool: &SqlitePool, ci: &str) -> Result<Doctor> {
    Ok(repo::doctors::create(pool, &new_doctor(ci)).await?)
}

/// Expediente das 08:00 às 18:00 de segunda a sábado
pub async fn full_week_schedule(pool: &SqlitePool, doctor: &Doctor) -> Result<Vec<WorkSchedule>> {
    let mut blocks = Vec::new();
    for day in 1..=6 {
        blocks.push(
            repo::schedules::create_work_schedule(
                pool,
                &NewWorkSchedule {
                    doctor_id: doctor.id,
                    day_of_week: day,
                    start_time: hm(8, 0),
                    end_time: hm(18, 0),
                },
            )
            .await?,
        );
    }
    Ok(blocks)
}

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("horário válido")
}

/// Próxima segunda-feira (sempre no futuro, ao menos um dia à frente)
pub fn next_monday() -> NaiveDate {
    let today = Local::now().date_naive();
    let days_ahead = 7 - today.weekday().num_days_from_monday() as i64;
    today + Duration::days(days_ahead)
}

/// Horário na próxima segunda-feira
pub fn next_monday_at(hour: u32, minute: u32) -> NaiveDateTime {
    next_monday().and_time(hm(hour, minute))
}
