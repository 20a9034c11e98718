use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::schedule::parse_clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    /// Overflow booking made outside normal slot capacity.
    Sobreturno,
}

impl AppointmentStatus {
    /// Whether an appointment in this state occupies its regular slot.
    pub fn blocks_slot(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub reminder_sent: bool,
}

impl Appointment {
    /// Local start instant, `None` when the time label is malformed.
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        parse_clock(&self.time_slot).map(|t| self.date.and_time(t))
    }
}

/// Validated booking data; id, status and timestamps are assigned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub date: NaiveDate,
    pub time_slot: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub notes: Option<String>,
}

/// The appointment set of one scheduling session.
///
/// Mutations go through `Arc::make_mut`, so a snapshot taken before a
/// mutation keeps observing the old entries.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Arc<Vec<Appointment>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<Appointment>> {
        Arc::clone(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Appointment> {
        self.entries.iter().find(|a| a.id == id)
    }

    /// Entries on `date` (or all of them), ordered by date then time label.
    pub fn list(&self, date: Option<NaiveDate>) -> Vec<Appointment> {
        let mut out: Vec<Appointment> = self
            .entries
            .iter()
            .filter(|a| date.map_or(true, |d| a.date == d))
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.date, &a.time_slot).cmp(&(b.date, &b.time_slot)));
        out
    }

    /// Append a new appointment. Slot availability is the caller's concern.
    pub fn create(
        &mut self,
        data: NewAppointment,
        is_sobreturno: bool,
        now: NaiveDateTime,
    ) -> Appointment {
        let appointment = Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            date: data.date,
            time_slot: data.time_slot,
            customer_name: data.customer_name,
            customer_phone: data.customer_phone,
            customer_email: data.customer_email,
            status: if is_sobreturno {
                AppointmentStatus::Sobreturno
            } else {
                AppointmentStatus::Pending
            },
            notes: data.notes,
            created_at: now,
            reminder_sent: false,
        };
        Arc::make_mut(&mut self.entries).push(appointment.clone());
        appointment
    }

    /// Mark as cancelled. Unknown ids are ignored. Returns whether anything changed.
    pub fn cancel(&mut self, id: &str) -> bool {
        self.update(id, |a| {
            if a.status == AppointmentStatus::Cancelled {
                return false;
            }
            a.status = AppointmentStatus::Cancelled;
            true
        })
    }

    /// Pending → confirmed. Any other state, or an unknown id, is left alone.
    pub fn confirm(&mut self, id: &str) -> bool {
        self.update(id, |a| {
            if a.status != AppointmentStatus::Pending {
                return false;
            }
            a.status = AppointmentStatus::Confirmed;
            true
        })
    }

    pub fn mark_reminded(&mut self, id: &str) -> bool {
        self.update(id, |a| !std::mem::replace(&mut a.reminder_sent, true))
    }

    fn update(&mut self, id: &str, apply: impl FnOnce(&mut Appointment) -> bool) -> bool {
        let Some(index) = self.entries.iter().position(|a| a.id == id) else {
            return false;
        };
        let mut updated = self.entries[index].clone();
        if !apply(&mut updated) {
            return false;
        }
        Arc::make_mut(&mut self.entries)[index] = updated;
        true
    }
}

// ── Tests ──
