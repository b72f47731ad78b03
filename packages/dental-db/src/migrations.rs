//! Esquema da clínica, versionado em `PRAGMA user_version`.
//!
//! Cada entrada de `MIGRATIONS` é aplicada uma única vez, dentro de uma
//! transação que também avança a versão.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Passos do esquema, na ordem; a versão N corresponde ao índice N-1
const MIGRATIONS: &[&str] = &[
    // v1: cadastros, agenda, financeiro, prontuário e usuários
    r#"
    CREATE TABLE IF NOT EXISTS patients (
        id BLOB PRIMARY KEY NOT NULL,
        ci TEXT NOT NULL UNIQUE,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT UNIQUE,
        phone TEXT,
        birth_date DATE,
        gender TEXT,
        address TEXT,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    CREATE TABLE IF NOT EXISTS doctors (
        id BLOB PRIMARY KEY NOT NULL,
        ci TEXT NOT NULL UNIQUE,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        phone TEXT,
        specialty TEXT,
        active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    CREATE TABLE IF NOT EXISTS treatments (
        id BLOB PRIMARY KEY NOT NULL,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
        active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    CREATE TABLE IF NOT EXISTS work_schedules (
        id BLOB PRIMARY KEY NOT NULL,
        doctor_id BLOB NOT NULL,
        day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 1 AND 7),
        start_time TIME NOT NULL,
        end_time TIME NOT NULL,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (doctor_id) REFERENCES doctors (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS doctor_permissions (
        id BLOB PRIMARY KEY NOT NULL,
        doctor_id BLOB NOT NULL,
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        reason TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (doctor_id) REFERENCES doctors (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS appointments (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        doctor_id BLOB NOT NULL,
        treatment_id BLOB,
        scheduled_at DATETIME NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('scheduled', 'completed', 'canceled', 'no_show')),
        reason TEXT,
        notes TEXT,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE,
        FOREIGN KEY (doctor_id) REFERENCES doctors (id) ON DELETE RESTRICT,
        FOREIGN KEY (treatment_id) REFERENCES treatments (id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS payments (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        appointment_id BLOB,
        amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
        method TEXT NOT NULL CHECK (method IN ('cash', 'card', 'transfer', 'other')),
        paid_at TIMESTAMP NOT NULL,
        concept TEXT,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE RESTRICT,
        FOREIGN KEY (appointment_id) REFERENCES appointments (id) ON DELETE SET NULL
    );

    -- Histórico clínico: um por paciente, anotações cifradas
    CREATE TABLE IF NOT EXISTS medical_histories (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL UNIQUE,
        notes_ciphertext BLOB NOT NULL,
        notes_nonce BLOB NOT NULL,
        attention_count INTEGER NOT NULL DEFAULT 0,
        last_attention_at TIMESTAMP,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS medical_attentions (
        id BLOB PRIMARY KEY NOT NULL,
        appointment_id BLOB NOT NULL UNIQUE,
        patient_id BLOB NOT NULL,
        doctor_id BLOB NOT NULL,
        attended_at TIMESTAMP NOT NULL,
        notes_ciphertext BLOB NOT NULL,
        notes_nonce BLOB NOT NULL,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (appointment_id) REFERENCES appointments (id) ON DELETE CASCADE,
        FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE,
        FOREIGN KEY (doctor_id) REFERENCES doctors (id) ON DELETE RESTRICT
    );

    -- Índices para otimização
    CREATE INDEX IF NOT EXISTS idx_appointments_doctor_at ON appointments (doctor_id, scheduled_at);
    CREATE INDEX IF NOT EXISTS idx_appointments_patient_at ON appointments (patient_id, scheduled_at);
    CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments (status);
    CREATE INDEX IF NOT EXISTS idx_payments_patient ON payments (patient_id);
    CREATE INDEX IF NOT EXISTS idx_payments_paid_at ON payments (paid_at);
    CREATE INDEX IF NOT EXISTS idx_work_schedules_doctor ON work_schedules (doctor_id, day_of_week);
    CREATE INDEX IF NOT EXISTS idx_permissions_doctor ON doctor_permissions (doctor_id, start_date);
    CREATE INDEX IF NOT EXISTS idx_attentions_patient ON medical_attentions (patient_id);
    "#,
    // 002_users_and_keys.sql
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY NOT NULL,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('admin', 'doctor', 'receptionist')),
        doctor_id BLOB,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (doctor_id) REFERENCES doctors (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS master_keys (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        active BOOLEAN NOT NULL DEFAULT 0,
        wrapped_key_ciphertext BLOB NOT NULL,
        wrapped_key_nonce BLOB NOT NULL,
        kdf_salt BLOB NOT NULL,
        key_version INTEGER NOT NULL
    );
    "#,
];

async fn apply(pool: &SqlitePool, version: i64, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(sql).execute(&mut *tx).await?;
    // PRAGMA não aceita parâmetros ligados
    sqlx::query(&format!("PRAGMA user_version = {}", version))
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Leva o esquema até a última versão conhecida
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .context("Não foi possível ler a versão do esquema")?;
    let target = MIGRATIONS.len() as i64;

    if current >= target {
        debug!(version = current, "Esquema já atualizado");
        return Ok(());
    }

    for (version, sql) in (1..).zip(MIGRATIONS.iter()).skip(current.max(0) as usize) {
        apply(pool, version, sql)
            .await
            .with_context(|| format!("Migração v{} falhou", version))?;
        info!(version, "Migração aplicada");
    }

    info!(from = current, to = target, "Esquema atualizado");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqliteConnectOptions;
    use tempfile::tempdir;

    async fn fresh_pool(dir: &std::path::Path) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::new()
            .filename(dir.join("schema.db"))
            .create_if_missing(true)
            .foreign_keys(true);
        Ok(SqlitePool::connect_with(options).await?)
    }

    #[tokio::test]
    async fn schema_is_created_once() -> Result<()> {
        let dir = tempdir()?;
        let pool = fresh_pool(dir.path()).await?;

        run_migrations(&pool).await?;
        run_migrations(&pool).await?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version").fetch_one(&pool).await?;
        assert_eq!(version, MIGRATIONS.len() as i64);

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&pool)
                .await?;
        let expected = [
            "appointments",
            "doctor_permissions",
            "doctors",
            "master_keys",
            "medical_attentions",
            "medical_histories",
            "patients",
            "payments",
            "treatments",
            "users",
            "work_schedules",
        ];
        for table in expected {
            assert!(tables.iter().any(|t| t == table), "tabela ausente: {}", table);
        }
        Ok(())
    }
}
