use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::config::{minute_of_day, parse_clock, weekday_index, ScheduleConfig};

/// One bookable interval inside a working day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// `YYYY-MM-DD-HH:MM`, stable for a given day and start time.
    pub id: String,
    /// Start label, "HH:MM".
    pub time: String,
    pub available: bool,
}

impl TimeSlot {
    fn at(date: NaiveDate, minute: u32) -> Self {
        let time = format!("{:02}:{:02}", minute / 60, minute % 60);
        Self {
            id: format!("{}-{}", date.format("%Y-%m-%d"), time),
            time,
            available: true,
        }
    }
}

/// Why a day produced no slots even though it is a working day.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DegradeReason {
    #[error("invalid {field} time {value:?}")]
    InvalidTime { field: &'static str, value: String },

    #[error("slot duration must be positive")]
    ZeroSlotDuration,
}

/// Result of slot generation before the degraded path is flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    Slots(Vec<TimeSlot>),
    Degraded(DegradeReason),
}

/// Parsed working window in minutes since midnight.
struct DayWindow {
    start: u32,
    end: u32,
    break_start: u32,
    break_end: u32,
}

impl DayWindow {
    fn parse(config: &ScheduleConfig) -> Result<Self, DegradeReason> {
        let field = |name: &'static str, value: &str| {
            parse_clock(value)
                .map(minute_of_day)
                .ok_or_else(|| DegradeReason::InvalidTime {
                    field: name,
                    value: value.to_string(),
                })
        };

        Ok(Self {
            start: field("work_hours.start", &config.work_hours.start)?,
            end: field("work_hours.end", &config.work_hours.end)?,
            break_start: field("break_time.start", &config.break_time.start)?,
            break_end: field("break_time.end", &config.break_time.end)?,
        })
    }

    /// A slot starting at the break start is inside the break, one starting at its end is not.
    fn in_break(&self, minute: u32) -> bool {
        minute >= self.break_start && minute < self.break_end
    }
}

/// Generate the slots of `date`, reporting a malformed config instead of hiding it.
pub fn try_generate_slots(date: NaiveDate, config: &ScheduleConfig) -> SlotOutcome {
    if !config.is_work_day(weekday_index(date)) {
        return SlotOutcome::Slots(Vec::new());
    }

    let window = match DayWindow::parse(config) {
        Ok(w) => w,
        Err(reason) => return SlotOutcome::Degraded(reason),
    };

    let step = config.slot_duration;
    if step == 0 {
        return SlotOutcome::Degraded(DegradeReason::ZeroSlotDuration);
    }

    let mut slots = Vec::new();
    let mut minute = window.start;
    while minute < window.end {
        if !window.in_break(minute) {
            slots.push(TimeSlot::at(date, minute));
        }
        minute = match minute.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }

    SlotOutcome::Slots(slots)
}

/// Bookable slots for `date`. Never fails: a malformed config yields an empty day.
pub fn generate_slots(date: NaiveDate, config: &ScheduleConfig) -> Vec<TimeSlot> {
    match try_generate_slots(date, config) {
        SlotOutcome::Slots(slots) => slots,
        SlotOutcome::Degraded(reason) => {
            tracing::warn!("No slots for {}: {}", date, reason);
            Vec::new()
        }
    }
}

// ── Tests ──
