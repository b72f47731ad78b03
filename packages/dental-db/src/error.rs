//! Erros dos repositórios da clínica

use thiserror::Error;

/// Código SQLite estendido para violação de UNIQUE
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
/// Código SQLite estendido para violação de PRIMARY KEY
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
/// Código SQLite estendido para violação de FOREIGN KEY
const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";
/// Código SQLite estendido para violação de CHECK
const SQLITE_CONSTRAINT_CHECK: &str = "275";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Banco indisponível: {0}")]
    ConnectionError(String),

    #[error("Falha na consulta SQL: {0}")]
    QueryError(String),

    #[error("Não encontrado: {0}")]
    NotFound(String),

    /// UNIQUE, FOREIGN KEY ou CHECK recusados pelo SQLite
    #[error("Restrição violada: {0}")]
    ConstraintViolation(String),

    /// Horário indisponível (sobreposição, fora do expediente, licença)
    #[error("Conflito de agenda: {0}")]
    ScheduleConflict(String),

    /// Regra de negócio violada (transição de status inválida, vínculo incoerente)
    #[error("Operação inválida: {0}")]
    InvalidOperation(String),

    #[error("Anotação clínica ilegível: {0}")]
    CryptoError(String),

    #[error("Falha interna do banco: {0}")]
    InternalError(String),
}

impl DbError {
    pub(crate) fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DbError::NotFound(format!("{} {}", entity, id))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DbError::NotFound("registro".to_string()),
            sqlx::Error::Database(dbe) => {
                if let Some(code) = dbe.code() {
                    match code.as_ref() {
                        SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY => {
                            return DbError::ConstraintViolation(format!(
                                "registro duplicado ({})",
                                dbe.message()
                            ));
                        }
                        SQLITE_CONSTRAINT_FOREIGNKEY => {
                            return DbError::ConstraintViolation(
                                "registro referenciado por outros dados ou referência inexistente"
                                    .to_string(),
                            );
                        }
                        SQLITE_CONSTRAINT_CHECK => {
                            return DbError::ConstraintViolation(dbe.message().to_string());
                        }
                        _ => {}
                    }
                }
                DbError::QueryError(dbe.message().to_string())
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::QueryError(format!("Coluna não encontrada: {}", col))
            }
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::QueryError(format!("Tipo não encontrado: {}", type_name))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::QueryError(format!("Erro ao decodificar coluna {}: {}", index, source))
            }
            sqlx::Error::Io(io_err) => DbError::ConnectionError(io_err.to_string()),
            sqlx::Error::Configuration(conf_err) => DbError::ConnectionError(conf_err.to_string()),
            sqlx::Error::PoolClosed => {
                DbError::ConnectionError("Pool de conexões fechado".to_string())
            }
            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionError("Timeout no pool de conexões".to_string())
            }
            sqlx::Error::WorkerCrashed => {
                DbError::InternalError("Worker do banco de dados falhou".to_string())
            }
            other => DbError::InternalError(other.to_string()),
        }
    }
}

impl From<crate::crypto::CryptoError> for DbError {
    fn from(error: crate::crypto::CryptoError) -> Self {
        DbError::CryptoError(error.to_string())
    }
}

/// Resultado padrão dos repositórios
pub type DbResult<T> = Result<T, DbError>;
