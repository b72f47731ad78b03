use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::validation::{range_error, validate_ci, validate_not_blank};

/// Odontólogo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Doctor {
    pub id: Uuid,
    pub ci: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    /// Médicos inativos não recebem novos agendamentos
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewDoctor {
    #[validate(custom = "validate_ci")]
    pub ci: String,
    #[validate(length(min = 1, max = 80), custom = "validate_not_blank")]
    pub first_name: String,
    #[validate(length(min = 1, max = 80), custom = "validate_not_blank")]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 80))]
    pub specialty: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct DoctorUpdate {
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
    #[validate(length(max = 80))]
    pub specialty: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorFilter {
    pub search: Option<String>,
    pub active: Option<bool>,
}

/// Bloco de expediente semanal de um médico
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkSchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    /// 1 = segunda ... 7 = domingo
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_new_schedule"))]
pub struct NewWorkSchedule {
    pub doctor_id: Uuid,
    #[validate(range(min = 1, max = 7))]
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

fn validate_new_schedule(schedule: &NewWorkSchedule) -> Result<(), ValidationError> {
    if schedule.start_time >= schedule.end_time {
        return Err(range_error("o início do expediente deve ser anterior ao fim"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct WorkScheduleUpdate {
    #[validate(range(min = 1, max = 7))]
    pub day_of_week: Option<i32>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkScheduleFilter {
    pub doctor_id: Option<Uuid>,
    pub day_of_week: Option<i32>,
}

/// Situação de um pedido de licença
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PermissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Pending => write!(f, "pending"),
            PermissionStatus::Approved => write!(f, "approved"),
            PermissionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Licença (permissão de ausência) de um médico num intervalo de datas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DoctorPermission {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    /// Inclusiva
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: PermissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorPermission {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_new_permission"))]
pub struct NewDoctorPermission {
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(length(min = 3, max = 500), custom = "validate_not_blank")]
    pub reason: String,
}

fn validate_new_permission(permission: &NewDoctorPermission) -> Result<(), ValidationError> {
    if permission.start_date > permission.end_date {
        return Err(range_error("a data inicial deve ser anterior ou igual à final"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct DoctorPermissionUpdate {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[validate(length(min = 3, max = 500), custom = "validate_not_blank")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorPermissionFilter {
    pub doctor_id: Option<Uuid>,
    pub status: Option<PermissionStatus>,
}
