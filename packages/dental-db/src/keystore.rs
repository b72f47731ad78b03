//! Armazenamento da chave mestra
//!
//! A tabela `master_keys` guarda a chave de dados embrulhada. Somente uma linha
//! fica ativa; na primeira inicialização a chave é gerada e gravada.

use anyhow::{bail, Context, Result};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::crypto::{self, EncryptedData, EncryptionKey};

/// Versão atual do formato de embrulho
const KEY_VERSION: i64 = 1;

/// Carrega a chave mestra ativa ou cria uma nova se o banco ainda não tiver uma
pub async fn load_or_create_master_key(pool: &SqlitePool, passphrase: &str) -> Result<EncryptionKey> {
    if passphrase.is_empty() {
        bail!("A frase-senha do banco de dados não pode ser vazia");
    }

    let row = sqlx::query(
        "SELECT wrapped_key_ciphertext, wrapped_key_nonce, kdf_salt \
         FROM master_keys WHERE active = 1 ORDER BY id DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
    .context("Falha ao consultar chave mestra")?;

    if let Some(row) = row {
        let wrapped = EncryptedData {
            ciphertext: row.try_get("wrapped_key_ciphertext")?,
            nonce: row.try_get("wrapped_key_nonce")?,
        };
        let salt: Vec<u8> = row.try_get("kdf_salt")?;
        let key = crypto::unwrap_key(&wrapped, passphrase, &salt)
            .context("Não foi possível desbloquear a chave mestra")?;
        info!("Chave mestra carregada");
        return Ok(key);
    }

    let key = EncryptionKey::generate();
    let salt = crypto::generate_salt();
    let wrapped = crypto::wrap_key(&key, passphrase, &salt)?;

    sqlx::query(
        "INSERT INTO master_keys (active, wrapped_key_ciphertext, wrapped_key_nonce, kdf_salt, key_version) \
         VALUES (1, ?, ?, ?, ?)",
    )
    .bind(&wrapped.ciphertext)
    .bind(&wrapped.nonce)
    .bind(&salt)
    .bind(KEY_VERSION)
    .execute(pool)
    .await
    .context("Falha ao gravar chave mestra")?;

    info!("Nova chave mestra gerada");
    Ok(key)
}
