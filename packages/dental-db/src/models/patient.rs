use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::validation::{validate_ci, validate_not_blank, validate_past_date};

/// Paciente da clínica, identificado pela CI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Patient {
    pub id: Uuid,
    /// Cédula de identidade (única)
    pub ci: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPatient {
    #[validate(custom = "validate_ci")]
    pub ci: String,
    #[validate(length(min = 1, max = 80), custom = "validate_not_blank")]
    pub first_name: String,
    #[validate(length(min = 1, max = 80), custom = "validate_not_blank")]
    pub last_name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 30))]
    pub phone: Option<String>,
    #[validate(custom = "validate_past_date")]
    pub birth_date: Option<NaiveDate>,
    #[validate(length(max = 20))]
    pub gender: Option<String>,
    #[validate(length(max = 200))]
    pub address: Option<String>,
}

/// Alteração parcial: somente os campos presentes são gravados
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PatientUpdate {
    #[validate(custom = "validate_ci")]
    pub ci: Option<String>,
    #[validate(length(min = 1, max = 80), custom = "validate_not_blank")]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 80), custom = "validate_not_blank")]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 30))]
    pub phone: Option<String>,
    #[validate(custom = "validate_past_date")]
    pub birth_date: Option<NaiveDate>,
    #[validate(length(max = 20))]
    pub gender: Option<String>,
    #[validate(length(max = 200))]
    pub address: Option<String>,
}

/// Filtro da listagem de pacientes (busca por nome, CI ou e-mail)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientFilter {
    pub search: Option<String>,
}

/// Saldo de um paciente em centavos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatientBalance {
    pub patient_id: Uuid,
    /// Soma dos preços dos tratamentos de consultas concluídas
    pub billed_cents: i64,
    pub paid_cents: i64,
    /// `billed_cents - paid_cents`; negativo indica crédito
    pub due_cents: i64,
}
