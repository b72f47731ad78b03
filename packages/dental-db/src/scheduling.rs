//! Regras de agenda
//!
//! Toda consulta ocupa uma janela fixa de 90 minutos a partir do horário
//! marcado. Duas consultas entram em conflito quando compartilham o médico ou
//! o paciente e suas janelas se interceptam (intervalos semiabertos, então
//! janelas encostadas não conflitam).

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::models::{Appointment, DoctorPermission, PermissionStatus, WorkSchedule};

/// Duração da janela ocupada por uma consulta
pub const APPOINTMENT_BLOCK_MINUTES: i64 = 90;

/// Passo entre horários oferecidos na disponibilidade
pub const SLOT_STEP_MINUTES: i64 = 30;

pub fn block_duration() -> Duration {
    Duration::minutes(APPOINTMENT_BLOCK_MINUTES)
}

/// Fim (exclusivo) da janela ocupada por uma consulta iniciada em `start`
pub fn block_end(start: NaiveDateTime) -> NaiveDateTime {
    start + block_duration()
}

/// Interseção das janelas `[a, a+90)` e `[b, b+90)`
pub fn overlaps(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    a < block_end(b) && b < block_end(a)
}

/// Consulta proposta, ainda não gravada
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Consulta sendo remarcada (ignorada na varredura)
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start: NaiveDateTime,
}

/// Com quem a consulta proposta colide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictParty {
    Doctor,
    Patient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    pub appointment_id: Uuid,
    pub party: ConflictParty,
    pub start: NaiveDateTime,
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let who = match self.party {
            ConflictParty::Doctor => "o médico",
            ConflictParty::Patient => "o paciente",
        };
        write!(
            f,
            "{} já tem a consulta {} às {}",
            who,
            self.appointment_id,
            self.start.format("%Y-%m-%d %H:%M")
        )
    }
}

/// Varre as consultas existentes e devolve o primeiro conflito.
/// Consultas canceladas e a própria consulta remarcada são ignoradas.
pub fn find_conflict(candidate: &Candidate, existing: &[Appointment]) -> Option<Conflict> {
    existing
        .iter()
        .filter(|a| a.status.occupies_slot())
        .filter(|a| Some(a.id) != candidate.appointment_id)
        .filter(|a| overlaps(candidate.start, a.scheduled_at))
        .find_map(|a| {
            let party = if a.doctor_id == candidate.doctor_id {
                ConflictParty::Doctor
            } else if a.patient_id == candidate.patient_id {
                ConflictParty::Patient
            } else {
                return None;
            };
            Some(Conflict {
                appointment_id: a.id,
                party,
                start: a.scheduled_at,
            })
        })
}

/// Dia da semana ISO (1 = segunda)
pub fn iso_weekday(date: NaiveDate) -> i32 {
    date.weekday().number_from_monday() as i32
}

/// A janela inteira precisa caber num único bloco de expediente do dia.
/// Janelas que atravessam a meia-noite nunca cabem.
pub fn fits_work_schedule(start: NaiveDateTime, schedules: &[WorkSchedule]) -> bool {
    let end = block_end(start);
    if end.date() != start.date() && end.time() != NaiveTime::MIN {
        return false;
    }

    let weekday = iso_weekday(start.date());
    schedules
        .iter()
        .filter(|s| s.day_of_week == weekday)
        .any(|s| {
            let block_start = start.date().and_time(s.start_time);
            let block_stop = start.date().and_time(s.end_time);
            block_start <= start && end <= block_stop
        })
}

/// Licença aprovada cobrindo a data
pub fn on_leave(date: NaiveDate, permissions: &[DoctorPermission]) -> bool {
    permissions
        .iter()
        .any(|p| p.status == PermissionStatus::Approved && p.covers(date))
}

/// Horários de início livres no dia: dentro do expediente, sem licença e sem
/// colidir com `busy`, em passos de `step_minutes` a partir do início de cada
/// bloco.
pub fn free_slots(
    date: NaiveDate,
    schedules: &[WorkSchedule],
    permissions: &[DoctorPermission],
    busy: &[Appointment],
    step_minutes: i64,
) -> Vec<NaiveDateTime> {
    if on_leave(date, permissions) || step_minutes <= 0 {
        return Vec::new();
    }

    let weekday = iso_weekday(date);
    let step = Duration::minutes(step_minutes);
    let mut blocks: Vec<&WorkSchedule> = schedules
        .iter()
        .filter(|s| s.day_of_week == weekday)
        .collect();
    blocks.sort_by_key(|s| s.start_time);

    let mut slots = Vec::new();
    for block in blocks {
        let stop = date.and_time(block.end_time);
        let mut start = date.and_time(block.start_time);
        while block_end(start) <= stop {
            let taken = busy
                .iter()
                .filter(|a| a.status.occupies_slot())
                .any(|a| overlaps(start, a.scheduled_at));
            if !taken && !slots.contains(&start) {
                slots.push(start);
            }
            start += step;
        }
    }
    slots
}
