//! Regras de validação compartilhadas pelos modelos de entrada

use std::borrow::Cow;

use chrono::{NaiveDate, Utc};
use validator::ValidationError;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Cédula de identidade: 5 a 10 dígitos, com complemento opcional (`1234567-1A`)
pub fn validate_ci(ci: &str) -> Result<(), ValidationError> {
    let (number, complement) = match ci.split_once('-') {
        Some((n, c)) => (n, Some(c)),
        None => (ci, None),
    };

    let number_ok = (5..=10).contains(&number.len()) && number.chars().all(|c| c.is_ascii_digit());
    let complement_ok = complement.map_or(true, |c| {
        (1..=3).contains(&c.len())
            && c.chars().all(|ch| ch.is_ascii_digit() || ch.is_ascii_uppercase())
    });

    if number_ok && complement_ok {
        Ok(())
    } else {
        Err(error("ci", "CI deve ter de 5 a 10 dígitos e complemento opcional"))
    }
}

/// Datas de nascimento não podem estar no futuro
pub fn validate_past_date(date: &NaiveDate) -> Result<(), ValidationError> {
    if *date > Utc::now().date_naive() {
        return Err(error("past_date", "a data não pode estar no futuro"));
    }
    Ok(())
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error("blank", "o campo não pode ficar em branco"));
    }
    Ok(())
}

pub(crate) fn range_error(message: &'static str) -> ValidationError {
    error("range", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ci_accepts_plain_and_complement() {
        assert!(validate_ci("1234567").is_ok());
        assert!(validate_ci("1234567-1A").is_ok());
    }

    #[test]
    fn ci_rejects_malformed() {
        assert!(validate_ci("123").is_err());
        assert!(validate_ci("12345678901").is_err());
        assert!(validate_ci("12a4567").is_err());
        assert!(validate_ci("1234567-").is_err());
        assert!(validate_ci("1234567-1a").is_err());
    }

    #[test]
    fn future_birth_date_rejected() {
        let tomorrow = Utc::now().date_naive().succ_opt().unwrap();
        assert!(validate_past_date(&tomorrow).is_err());
    }
}
