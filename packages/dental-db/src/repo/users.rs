use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{NewUser, Role, User};

const COLUMNS: &str = "id, email, name, password_hash, role, doctor_id, created_at, updated_at";

/// Cria um usuário. A senha chega já transformada em hash.
pub async fn create(pool: &SqlitePool, new: &NewUser, password_hash: &str) -> DbResult<User> {
    match (new.role, new.doctor_id) {
        (Role::Doctor, None) => {
            return Err(DbError::InvalidOperation(
                "usuários médicos precisam de um médico vinculado".to_string(),
            ))
        }
        (Role::Doctor, Some(doctor_id)) => {
            super::doctors::get(pool, doctor_id).await?;
        }
        (_, Some(_)) => {
            return Err(DbError::InvalidOperation(
                "apenas usuários médicos podem ter médico vinculado".to_string(),
            ))
        }
        (_, None) => {}
    }

    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO users (id, email, name, password_hash, role, doctor_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(new.email.trim().to_lowercase())
    .bind(new.name.trim())
    .bind(password_hash)
    .bind(new.role)
    .bind(new.doctor_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    info!(user_id = %id, role = %new.role, "Usuário criado");
    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> DbResult<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("usuário", id))
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> DbResult<Option<User>> {
    Ok(
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = ?", COLUMNS))
            .bind(email.trim().to_lowercase())
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn count(pool: &SqlitePool) -> DbResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?)
}
