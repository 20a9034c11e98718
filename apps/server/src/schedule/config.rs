use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Shortest slot a provider may configure (minutes).
pub const MIN_SLOT_DURATION: u32 = 15;
/// Longest slot a provider may configure (minutes).
pub const MAX_SLOT_DURATION: u32 = 120;

// ── Types ──

/// A `start`–`end` pair of "HH:MM" labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// Working-hours configuration consumed by slot generation and grid building.
///
/// Times are kept as raw labels: a malformed value must not prevent the
/// calendar from rendering, it only empties the affected days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Active weekday indices, 0 = Sunday … 6 = Saturday.
    pub work_days: Vec<u8>,
    pub work_hours: TimeRange,
    pub break_time: TimeRange,
    /// Slot length in minutes.
    pub slot_duration: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            work_days: vec![1, 2, 3, 4, 5],
            work_hours: TimeRange::new("09:00", "17:00"),
            break_time: TimeRange::new("12:00", "13:00"),
            slot_duration: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Día laboral inválido: {0}")]
    InvalidWeekday(u8),

    #[error("Hora inválida en {field}: {value}")]
    InvalidTime { field: &'static str, value: String },

    #[error("El horario de inicio debe ser anterior al de fin")]
    WorkHoursInverted,

    #[error("El inicio del descanso debe ser anterior a su fin")]
    BreakInverted,

    #[error("El descanso debe estar dentro del horario laboral")]
    BreakOutsideWorkHours,

    #[error("El descanso no puede ocupar todo el horario laboral")]
    BreakCoversWorkHours,

    #[error("La duración del turno debe estar entre 15 y 120 minutos (recibido: {0})")]
    SlotDurationOutOfRange(u32),
}

impl ScheduleConfig {
    pub fn is_work_day(&self, weekday: u8) -> bool {
        self.work_days.contains(&weekday)
    }

    /// Full check used by the settings surface before a config is accepted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(&day) = self.work_days.iter().find(|d| **d > 6) {
            return Err(ConfigError::InvalidWeekday(day));
        }

        let start = parse_field("work_hours.start", &self.work_hours.start)?;
        let end = parse_field("work_hours.end", &self.work_hours.end)?;
        let break_start = parse_field("break_time.start", &self.break_time.start)?;
        let break_end = parse_field("break_time.end", &self.break_time.end)?;

        if start >= end {
            return Err(ConfigError::WorkHoursInverted);
        }
        if break_start >= break_end {
            return Err(ConfigError::BreakInverted);
        }
        if break_start < start || break_end > end {
            return Err(ConfigError::BreakOutsideWorkHours);
        }
        if break_start == start && break_end == end {
            return Err(ConfigError::BreakCoversWorkHours);
        }

        if !(MIN_SLOT_DURATION..=MAX_SLOT_DURATION).contains(&self.slot_duration) {
            return Err(ConfigError::SlotDurationOutOfRange(self.slot_duration));
        }

        Ok(())
    }
}

// ── Helpers ──

fn parse_field(field: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    parse_clock(value).ok_or_else(|| ConfigError::InvalidTime {
        field,
        value: value.to_string(),
    })
}

static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-1]?[0-9]|2[0-3]):([0-5][0-9])$").unwrap());

/// Parse an "HH:MM" label (hour may be a single digit, minutes always two).
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    let caps = CLOCK_RE.captures(value)?;
    NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 0)
}

/// Minutes since midnight.
pub fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Weekday index with Sunday = 0.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

// ── Tests ──
