use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDate;
use std::sync::Arc;

use super::{api_error, require_caller, ApiError, Caller};
use crate::ledger::Appointment;
use crate::models::{
    ApiResponse, AppointmentsQuery, CreateAppointmentRequest, CreateAppointmentResponse,
};
use crate::notify::booking_message;
use crate::validation::validate_appointment;
use crate::AppState;

/// GET /api/appointments?date=YYYY-MM-DD
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<AppointmentsQuery>,
) -> Result<Json<ApiResponse<Vec<Appointment>>>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let date = match q.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => Some(
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| api_error(StatusCode::BAD_REQUEST, "Fecha inválida"))?,
        ),
        None => None,
    };
    let appointments = caller.read().ledger().list(date);
    Ok(Json(ApiResponse::success(appointments)))
}

/// POST /api/appointments
///
/// Regular booking: the day must be selectable and the slot still free.
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiResponse<CreateAppointmentResponse>>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    book(&state, &caller, &req, false)
}

/// POST /api/appointments/sobreturno
///
/// Overbooking: any valid date and time, regardless of availability.
pub async fn create_sobreturno(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiResponse<CreateAppointmentResponse>>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    book(&state, &caller, &req, true)
}

fn book(
    state: &AppState,
    caller: &Caller,
    req: &CreateAppointmentRequest,
    is_sobreturno: bool,
) -> Result<Json<ApiResponse<CreateAppointmentResponse>>, ApiError> {
    let data = validate_appointment(req)?;

    let (appointment, notifications) = {
        let mut session = caller.write();
        if !is_sobreturno {
            let free = session.peek_day(data.date).is_some_and(|day| {
                day.selectable
                    && day
                        .slots
                        .iter()
                        .any(|s| s.time == data.time_slot && s.available)
            });
            if !free {
                return Err(api_error(
                    StatusCode::CONFLICT,
                    "El horario seleccionado no está disponible",
                ));
            }
        }
        let appointment = session.create_appointment(data, is_sobreturno, crate::local_now());
        (appointment, session.settings().notifications.clone())
    };

    if notifications.confirmation_enabled {
        state.notifier.notify(booking_message(&appointment));
    }

    Ok(Json(ApiResponse::success(CreateAppointmentResponse {
        appointment,
        play_sound: notifications
            .sound_enabled
            .then_some(notifications.notification_sound),
    })))
}

/// POST /api/appointments/{id}/cancel
///
/// Unknown ids are not an error; `data` is the appointment when it exists.
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Option<Appointment>>>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let mut session = caller.write();
    session.cancel_appointment(&id);
    Ok(Json(ApiResponse::success(session.ledger().get(&id).cloned())))
}

/// POST /api/appointments/{id}/confirm
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Option<Appointment>>>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let mut session = caller.write();
    session.confirm_appointment(&id);
    Ok(Json(ApiResponse::success(session.ledger().get(&id).cloned())))
}
