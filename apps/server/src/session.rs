use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::sync::Arc;

use crate::ledger::{Appointment, Ledger, NewAppointment};
use crate::schedule::{annotate, build_month_grid, AnnotatedDay, AnnotatedMonthGrid, MonthGrid};
use crate::settings::UserSettings;

/// Per-user scheduling state: settings, the month being viewed, its cached
/// grid and the appointment ledger.
///
/// The grid is rebuilt only when the month or the settings change; ledger
/// mutations are picked up by re-annotating the cached grid on read.
#[derive(Debug, Clone)]
pub struct SchedulingSession {
    settings: UserSettings,
    year: i32,
    month: u32,
    grid: Arc<MonthGrid>,
    ledger: Ledger,
}

impl SchedulingSession {
    pub fn new(settings: UserSettings, today: NaiveDate) -> Self {
        let grid = build_month_grid(today.year(), today.month(), &settings.schedule);
        Self {
            settings,
            year: today.year(),
            month: today.month(),
            grid: Arc::new(grid),
            ledger: Ledger::new(),
        }
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    pub fn month(&self) -> (i32, u32) {
        (self.year, self.month)
    }

    pub fn grid(&self) -> Arc<MonthGrid> {
        Arc::clone(&self.grid)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn set_month(&mut self, year: i32, month: u32) {
        if (year, month) == (self.year, self.month) {
            return;
        }
        self.year = year;
        self.month = month;
        self.rebuild();
    }

    pub fn update_settings(&mut self, settings: UserSettings) {
        let schedule_changed = settings.schedule != self.settings.schedule;
        self.settings = settings;
        if schedule_changed {
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        self.grid = Arc::new(build_month_grid(self.year, self.month, &self.settings.schedule));
        tracing::debug!(
            "Rebuilt calendar {}-{:02} ({} cells)",
            self.year,
            self.month,
            self.grid.days.len()
        );
    }

    /// The cached grid reconciled against the current ledger.
    pub fn annotated(&self) -> AnnotatedMonthGrid {
        annotate(&self.grid, &self.ledger.snapshot())
    }

    /// Annotated cell for `date`, moving the session to that month first.
    pub fn day(&mut self, date: NaiveDate) -> Option<AnnotatedDay> {
        if !self.grid.contains_month_of(date) {
            self.set_month(date.year(), date.month());
        }
        let annotated = self.annotated();
        annotated
            .days
            .into_iter()
            .find(|d| d.date == date && !d.is_disabled)
    }

    /// Annotated cell for `date` leaving the viewed month alone. Dates outside
    /// the cached month are checked against a grid built just for the lookup.
    pub fn peek_day(&self, date: NaiveDate) -> Option<AnnotatedDay> {
        let snapshot = self.ledger.snapshot();
        let annotated = if self.grid.contains_month_of(date) {
            annotate(&self.grid, &snapshot)
        } else {
            let grid = build_month_grid(date.year(), date.month(), &self.settings.schedule);
            annotate(&grid, &snapshot)
        };
        annotated
            .days
            .into_iter()
            .find(|d| d.date == date && !d.is_disabled)
    }

    pub fn create_appointment(
        &mut self,
        data: NewAppointment,
        is_sobreturno: bool,
        now: NaiveDateTime,
    ) -> Appointment {
        let appointment = self.ledger.create(data, is_sobreturno, now);
        tracing::info!(
            "Appointment {} created for {} {} ({:?}, {} in ledger)",
            appointment.id,
            appointment.date,
            appointment.time_slot,
            appointment.status,
            self.ledger.len()
        );
        appointment
    }

    pub fn cancel_appointment(&mut self, id: &str) {
        if self.ledger.cancel(id) {
            tracing::info!("Appointment {} cancelled", id);
        }
    }

    pub fn confirm_appointment(&mut self, id: &str) {
        if self.ledger.confirm(id) {
            tracing::info!("Appointment {} confirmed", id);
        }
    }

    pub fn mark_reminded(&mut self, id: &str) -> bool {
        self.ledger.mark_reminded(id)
    }
}

// ── Tests ──
