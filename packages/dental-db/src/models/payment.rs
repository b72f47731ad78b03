use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Forma de pagamento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Other,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Transfer => write!(f, "transfer"),
            PaymentMethod::Other => write!(f, "other"),
        }
    }
}

/// Pagamento recebido de um paciente
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Consulta à qual o pagamento se refere, quando houver
    pub appointment_id: Option<Uuid>,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
    pub concept: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPayment {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    #[validate(range(min = 1, max = 100_000_000))]
    pub amount_cents: i64,
    pub method: PaymentMethod,
    /// Padrão: agora
    pub paid_at: Option<DateTime<Utc>>,
    #[validate(length(max = 200))]
    pub concept: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PaymentUpdate {
    pub appointment_id: Option<Uuid>,
    #[validate(range(min = 1, max = 100_000_000))]
    pub amount_cents: Option<i64>,
    pub method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    #[validate(length(max = 200))]
    pub concept: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilter {
    pub patient_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub method: Option<PaymentMethod>,
    /// Inclusivo, pela data de `paid_at`
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
