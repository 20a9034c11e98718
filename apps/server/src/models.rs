use serde::{Deserialize, Serialize};

use crate::auth::User;
use crate::ledger::Appointment;
use crate::settings::NotificationSound;

// ── API request/response types ──

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentsQuery {
    pub date: Option<String>,
}

/// Booking form as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub date: String,
    pub time: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateAppointmentResponse {
    pub appointment: Appointment,
    /// Sound the client should play, when sounds are enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_sound: Option<NotificationSound>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
