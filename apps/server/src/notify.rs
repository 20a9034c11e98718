use chrono::{Datelike, NaiveDate};

use crate::ledger::{Appointment, AppointmentStatus};

/// Fire-and-forget sink for provider notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, text: String);
}

/// Writes notifications to the log only.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, text: String) {
        tracing::info!("Notification: {}", text);
    }
}

/// Sends notifications to a Telegram chat via the Bot API.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: i64,
    http: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: i64) -> Self {
        Self {
            bot_token,
            chat_id,
            http: reqwest::Client::new(),
        }
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, text: String) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let http = self.http.clone();
        let chat_id = self.chat_id;

        tokio::spawn(async move {
            let resp = http
                .post(&url)
                .json(&serde_json::json!({
                    "chat_id": chat_id,
                    "text": text,
                    "parse_mode": "HTML"
                }))
                .send()
                .await;
            match resp {
                Ok(resp) if !resp.status().is_success() => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    tracing::error!("Telegram rejected notification: {} - {}", status, body);
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Failed to send Telegram notification: {}", e),
            }
        });
    }
}

// ── Messages ──

pub fn booking_message(appointment: &Appointment) -> String {
    let title = if appointment.status == AppointmentStatus::Sobreturno {
        "⚠️ Nuevo sobreturno"
    } else {
        "📅 Nuevo turno"
    };
    let mut text = format!(
        "{}\n\n👤 {}\n📞 {}\n🕐 {} a las {}",
        title,
        escape_html(&appointment.customer_name),
        escape_html(&appointment.customer_phone),
        format_date_es(appointment.date),
        escape_html(&appointment.time_slot),
    );
    if let Some(notes) = &appointment.notes {
        text.push_str(&format!("\n📝 {}", escape_html(notes)));
    }
    text
}

pub fn reminder_message(appointment: &Appointment) -> String {
    format!(
        "⏰ Recordatorio\n\n👤 {}\n🕐 {} a las {}",
        escape_html(&appointment.customer_name),
        format_date_es(appointment.date),
        escape_html(&appointment.time_slot),
    )
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// "lunes 20 de octubre"
pub fn format_date_es(date: NaiveDate) -> String {
    const WEEKDAYS: [&str; 7] = [
        "domingo", "lunes", "martes", "miércoles", "jueves", "viernes", "sábado",
    ];
    const MONTHS: [&str; 12] = [
        "enero", "febrero", "marzo", "abril", "mayo", "junio",
        "julio", "agosto", "septiembre", "octubre", "noviembre", "diciembre",
    ];
    format!(
        "{} {} de {}",
        WEEKDAYS[date.weekday().num_days_from_sunday() as usize],
        date.day(),
        MONTHS[date.month0() as usize],
    )
}

// ── Tests ──
