use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::grid::{CalendarDay, MonthGrid};
use super::slots::TimeSlot;
use crate::ledger::{Appointment, AppointmentStatus};

/// Highlight shown on a day cell, derived from that day's appointments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Sobreturno,
    Confirmed,
    Pending,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedDay {
    pub date: NaiveDate,
    pub is_disabled: bool,
    pub status: Option<DayStatus>,
    /// Enabled and at least one slot still free.
    pub selectable: bool,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedMonthGrid {
    pub year: i32,
    pub month: u32,
    pub days: Vec<AnnotatedDay>,
}

impl AnnotatedMonthGrid {
    pub fn day(&self, date: NaiveDate) -> Option<&AnnotatedDay> {
        self.days.iter().find(|d| d.date == date)
    }
}

/// Day status by priority: sobreturno, confirmed, pending, then all-cancelled.
pub fn day_status(appointments: &[&Appointment]) -> Option<DayStatus> {
    let has = |status: AppointmentStatus| appointments.iter().any(|a| a.status == status);

    if has(AppointmentStatus::Sobreturno) {
        Some(DayStatus::Sobreturno)
    } else if has(AppointmentStatus::Confirmed) {
        Some(DayStatus::Confirmed)
    } else if has(AppointmentStatus::Pending) {
        Some(DayStatus::Pending)
    } else if !appointments.is_empty()
        && appointments
            .iter()
            .all(|a| a.status == AppointmentStatus::Cancelled)
    {
        Some(DayStatus::Cancelled)
    } else {
        None
    }
}

/// Overlay appointment state on a built grid. The grid itself is left untouched.
pub fn annotate(grid: &MonthGrid, appointments: &[Appointment]) -> AnnotatedMonthGrid {
    let mut by_date: HashMap<NaiveDate, Vec<&Appointment>> = HashMap::new();
    for appointment in appointments {
        by_date.entry(appointment.date).or_default().push(appointment);
    }

    let days = grid
        .days
        .iter()
        .map(|day| {
            let day_appointments = by_date.get(&day.date).map(Vec::as_slice).unwrap_or(&[]);
            annotate_day(day, day_appointments)
        })
        .collect();

    AnnotatedMonthGrid {
        year: grid.year,
        month: grid.month,
        days,
    }
}

fn annotate_day(day: &CalendarDay, appointments: &[&Appointment]) -> AnnotatedDay {
    if day.is_disabled {
        return AnnotatedDay {
            date: day.date,
            is_disabled: true,
            status: None,
            selectable: false,
            slots: Vec::new(),
        };
    }

    let taken: HashSet<&str> = appointments
        .iter()
        .filter(|a| a.status.blocks_slot())
        .map(|a| a.time_slot.as_str())
        .collect();

    let slots: Vec<TimeSlot> = day
        .slots
        .iter()
        .map(|slot| TimeSlot {
            available: slot.available && !taken.contains(slot.time.as_str()),
            ..slot.clone()
        })
        .collect();

    AnnotatedDay {
        date: day.date,
        is_disabled: false,
        status: day_status(appointments),
        selectable: slots.iter().any(|s| s.available),
        slots,
    }
}

// ── Tests ──
