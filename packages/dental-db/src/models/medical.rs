//! Histórico clínico e atendimentos
//!
//! As anotações clínicas nunca são gravadas em claro: os repositórios cifram
//! `ClinicalNotes` e `AttentionNotes` com a chave mestra antes de persistir.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validation::validate_not_blank;

/// Conteúdo clínico do histórico de um paciente
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ClinicalNotes {
    #[validate(length(max = 2000))]
    pub allergies: Option<String>,
    /// Antecedentes patológicos
    #[validate(length(max = 4000))]
    pub pathological_background: Option<String>,
    #[validate(length(max = 2000))]
    pub current_medication: Option<String>,
    #[validate(length(max = 4000))]
    pub observations: Option<String>,
}

impl ClinicalNotes {
    /// Sobrescreve apenas os campos presentes em `patch`
    pub fn merge(&mut self, patch: ClinicalNotes) {
        if patch.allergies.is_some() {
            self.allergies = patch.allergies;
        }
        if patch.pathological_background.is_some() {
            self.pathological_background = patch.pathological_background;
        }
        if patch.current_medication.is_some() {
            self.current_medication = patch.current_medication;
        }
        if patch.observations.is_some() {
            self.observations = patch.observations;
        }
    }
}

/// Histórico clínico (um por paciente)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicalHistory {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub notes: ClinicalNotes,
    pub attention_count: i64,
    pub last_attention_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMedicalHistory {
    pub patient_id: Uuid,
    #[serde(default)]
    #[validate]
    pub notes: ClinicalNotes,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MedicalHistoryUpdate {
    #[serde(default)]
    #[validate]
    pub notes: ClinicalNotes,
}

/// Conteúdo clínico de um atendimento
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AttentionNotes {
    #[validate(length(min = 2, max = 2000), custom = "validate_not_blank")]
    pub diagnosis: String,
    /// Procedimento realizado
    #[validate(length(max = 2000))]
    pub procedure: Option<String>,
    #[validate(length(max = 2000))]
    pub prescription: Option<String>,
    #[validate(length(max = 4000))]
    pub observations: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AttentionNotesPatch {
    #[validate(length(min = 2, max = 2000), custom = "validate_not_blank")]
    pub diagnosis: Option<String>,
    #[validate(length(max = 2000))]
    pub procedure: Option<String>,
    #[validate(length(max = 2000))]
    pub prescription: Option<String>,
    #[validate(length(max = 4000))]
    pub observations: Option<String>,
}

impl AttentionNotes {
    pub fn apply(&mut self, patch: AttentionNotesPatch) {
        if let Some(diagnosis) = patch.diagnosis {
            self.diagnosis = diagnosis;
        }
        if patch.procedure.is_some() {
            self.procedure = patch.procedure;
        }
        if patch.prescription.is_some() {
            self.prescription = patch.prescription;
        }
        if patch.observations.is_some() {
            self.observations = patch.observations;
        }
    }
}

/// Atendimento médico de uma consulta
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicalAttention {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub attended_at: DateTime<Utc>,
    pub notes: AttentionNotes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registro de atendimento. `history` atualiza o histórico do paciente na
/// mesma transação.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMedicalAttention {
    pub appointment_id: Uuid,
    /// Padrão: agora
    pub attended_at: Option<DateTime<Utc>>,
    #[validate]
    pub notes: AttentionNotes,
    #[validate]
    pub history: Option<ClinicalNotes>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MedicalAttentionUpdate {
    pub attended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate]
    pub notes: AttentionNotesPatch,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicalAttentionFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
}
