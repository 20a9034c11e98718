use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::ledger::NewAppointment;
use crate::models::CreateAppointmentRequest;
use crate::schedule::{parse_clock, ConfigError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Schedule(#[from] ConfigError),

    #[error("El nombre debe tener al menos 2 caracteres")]
    NameTooShort,

    #[error("Ingresa un número de teléfono válido")]
    InvalidPhone,

    #[error("Ingresa un correo electrónico válido")]
    InvalidEmail,

    #[error("Fecha inválida")]
    InvalidDate,

    #[error("Hora inválida")]
    InvalidTime,

    #[error("El campo {0} debe tener al menos 2 caracteres")]
    FieldTooShort(&'static str),

    #[error("Número de WhatsApp inválido")]
    InvalidWhatsapp,

    #[error("Las horas de recordatorio deben estar entre 1 y 72")]
    ReminderHoursOutOfRange,
}

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{8,15}$").unwrap());

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// `+?` followed by 8–15 digits.
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// `local@domain.tld` without whitespace.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn min_len(value: &str, len: usize) -> bool {
    value.trim().chars().count() >= len
}

/// Check a booking form and turn it into ledger input.
pub fn validate_appointment(
    req: &CreateAppointmentRequest,
) -> Result<NewAppointment, ValidationError> {
    if !min_len(&req.name, 2) {
        return Err(ValidationError::NameTooShort);
    }
    let phone = req.phone.trim();
    if !is_valid_phone(phone) {
        return Err(ValidationError::InvalidPhone);
    }

    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    if let Some(email) = email {
        if !is_valid_email(email) {
            return Err(ValidationError::InvalidEmail);
        }
    }

    let date = NaiveDate::parse_from_str(req.date.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate)?;
    let time = parse_clock(req.time.trim()).ok_or(ValidationError::InvalidTime)?;

    Ok(NewAppointment {
        date,
        time_slot: time.format("%H:%M").to_string(),
        customer_name: req.name.trim().to_string(),
        customer_phone: phone.to_string(),
        customer_email: email.map(str::to_string),
        notes: req
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    })
}

// ── Tests ──
