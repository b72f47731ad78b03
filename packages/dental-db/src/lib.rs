//! Dental DB - Biblioteca de acesso ao banco de dados da clínica odontológica
//!
//! Esta biblioteca fornece:
//! - Modelos de dados (pacientes, médicos, consultas, pagamentos, prontuários)
//! - Migrações automáticas do banco de dados
//! - Criptografia das anotações clínicas
//! - Repositórios com as regras de agenda e de sincronização de prontuário
//! - Consultas de relatórios

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use tracing::info;

pub mod crypto;
pub mod error;
pub mod keystore;
pub mod migrations;
pub mod models;
pub mod reports;
pub mod repo;
pub mod scheduling;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use crypto::FieldCipher;
pub use error::{DbError, DbResult};

/// Parâmetros de abertura do banco da clínica
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub db_path: String,
    /// Desbloqueia a chave mestra das anotações clínicas
    pub key_phrase: String,
    pub max_connections: u32,
    /// 0 silencia o log de comandos SQL
    pub trace_level: u8,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_path: "data/dental.db".to_string(),
            // Sem frase padrão: quem abre o banco precisa informar uma
            key_phrase: String::new(),
            max_connections: 5,
            trace_level: 0,
        }
    }
}

fn connect_options(config: &DbConfig) -> SqliteConnectOptions {
    let options = SqliteConnectOptions::new()
        .filename(&config.db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .pragma("synchronous", "NORMAL");
    match config.trace_level {
        0 => options.disable_statement_logging(),
        _ => options,
    }
}

/// Abre o pool SQLite (criando o arquivo se preciso) e aplica as migrações
pub async fn init_db_pool(config: &DbConfig) -> Result<SqlitePool> {
    let parent = Path::new(&config.db_path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Não foi possível criar o diretório {}", dir.display()))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connect_options(config))
        .await
        .with_context(|| format!("Não foi possível abrir {}", config.db_path))?;

    migrations::run_migrations(&pool)
        .await
        .context("Migrações do banco falharam")?;

    info!(path = %config.db_path, "Banco da clínica pronto");
    Ok(pool)
}

/// Pool de conexões mais a cifra das anotações clínicas
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
    pub cipher: Arc<FieldCipher>,
}

impl Database {
    /// Abre o banco, aplica migrações e desbloqueia a chave mestra
    pub async fn open(config: &DbConfig) -> Result<Self> {
        let pool = init_db_pool(config).await?;
        let key = keystore::load_or_create_master_key(&pool, &config.key_phrase).await?;
        Ok(Self {
            pool,
            cipher: Arc::new(FieldCipher::new(key)),
        })
    }
}
