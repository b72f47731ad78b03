use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Status possíveis de uma consulta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Agendada, aguardando atendimento
    Scheduled,
    /// Atendida (existe um atendimento médico registrado)
    Completed,
    /// Cancelada; não ocupa a agenda
    Canceled,
    /// Paciente não compareceu
    NoShow,
}

impl AppointmentStatus {
    /// Consultas canceladas liberam o horário
    pub fn occupies_slot(self) -> bool {
        !matches!(self, AppointmentStatus::Canceled)
    }

    /// Transições permitidas por alteração direta de status.
    /// `Completed` só é alcançado pelo registro de um atendimento.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (AppointmentStatus::Scheduled, AppointmentStatus::Canceled)
                | (AppointmentStatus::Scheduled, AppointmentStatus::NoShow)
        )
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Canceled => write!(f, "canceled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

/// Representa uma consulta agendada
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub treatment_id: Option<Uuid>,
    /// Horário local da clínica
    pub scheduled_at: NaiveDateTime,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Versão resumida para agendas, com nomes já resolvidos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AppointmentSummary {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub treatment_id: Option<Uuid>,
    pub treatment_name: Option<String>,
    pub scheduled_at: NaiveDateTime,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub treatment_id: Option<Uuid>,
    pub scheduled_at: NaiveDateTime,
    #[validate(length(max = 300))]
    pub reason: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Alteração parcial; mudar médico ou horário reaplica as regras de agenda
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AppointmentUpdate {
    pub doctor_id: Option<Uuid>,
    pub treatment_id: Option<Uuid>,
    pub scheduled_at: Option<NaiveDateTime>,
    #[validate(length(max = 300))]
    pub reason: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl AppointmentUpdate {
    pub fn touches_schedule(&self) -> bool {
        self.doctor_id.is_some() || self.scheduled_at.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    /// Um dia específico; tem precedência sobre `from`/`to`
    pub date: Option<NaiveDate>,
    /// Inclusivo
    pub from: Option<NaiveDate>,
    /// Inclusivo
    pub to: Option<NaiveDate>,
}

/// Horários livres de um médico num dia
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub on_leave: bool,
    pub slots: Vec<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_scheduled_can_be_canceled_or_missed() {
        use AppointmentStatus::*;
        assert!(Scheduled.can_transition_to(Canceled));
        assert!(Scheduled.can_transition_to(NoShow));
        assert!(!Scheduled.can_transition_to(Completed));
        assert!(!Canceled.can_transition_to(Scheduled));
        assert!(!Completed.can_transition_to(Canceled));
        assert!(!NoShow.can_transition_to(Canceled));
    }

    #[test]
    fn canceled_frees_slot() {
        assert!(!AppointmentStatus::Canceled.occupies_slot());
        assert!(AppointmentStatus::NoShow.occupies_slot());
    }
}
