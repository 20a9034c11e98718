use chrono::{NaiveDateTime, TimeDelta};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use crate::ledger::{Appointment, AppointmentStatus};
use crate::notify::reminder_message;
use crate::AppState;

/// Appointments starting within `(now, now + hours_before]` that still need a reminder.
pub fn due_reminders(
    appointments: &[Appointment],
    now: NaiveDateTime,
    hours_before: u32,
) -> Vec<&Appointment> {
    let horizon = now + TimeDelta::hours(i64::from(hours_before));
    appointments
        .iter()
        .filter(|a| a.status != AppointmentStatus::Cancelled && !a.reminder_sent)
        .filter(|a| a.starts_at().is_some_and(|start| start > now && start <= horizon))
        .collect()
}

/// One pass over every active session. Returns the number of reminders sent.
pub fn dispatch_due(state: &AppState, now: NaiveDateTime) -> usize {
    let mut sent = 0;

    for entry in state.sessions.iter() {
        let mut session = entry.value().write().unwrap_or_else(PoisonError::into_inner);
        let (enabled, hours) = {
            let n = &session.settings().notifications;
            (n.reminder_enabled, n.reminder_hours_before)
        };
        if !enabled {
            continue;
        }

        let snapshot = session.ledger().snapshot();
        for appointment in due_reminders(&snapshot, now, hours) {
            if session.mark_reminded(&appointment.id) {
                state.notifier.notify(reminder_message(appointment));
                sent += 1;
            }
        }
    }

    sent
}

/// Background loop checking for due reminders every `every`. Expired
/// tokens and their sessions are pruned on the same tick.
pub async fn run(state: Arc<AppState>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let now = crate::local_now();
        let (tokens, sessions) = state.prune_expired(now);
        if tokens > 0 {
            tracing::info!("Pruned {} expired token(s), {} session(s)", tokens, sessions);
        }
        let sent = dispatch_due(&state, now);
        if sent > 0 {
            tracing::info!("📬 Sent {} reminder(s)", sent);
        }
    }
}

// ── Tests ──
