mod auth;
mod config;
mod handlers;
mod ledger;
mod models;
mod notify;
mod reminders;
mod schedule;
mod session;
mod settings;
mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::NaiveDateTime;
use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use auth::{AuthStore, User};
use config::ServerConfig;
use notify::{LogNotifier, Notifier, TelegramNotifier};
use session::SchedulingSession;
use settings::UserSettings;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub auth: AuthStore,
    /// Scheduling sessions keyed by user id.
    pub sessions: DashMap<String, Arc<RwLock<SchedulingSession>>>,
    pub notifier: Arc<dyn Notifier>,
    /// Settings a new session starts with.
    pub default_settings: UserSettings,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            auth: AuthStore::new(),
            sessions: DashMap::new(),
            notifier,
            default_settings: UserSettings::default(),
            started_at: Instant::now(),
        }
    }

    /// The user's session, created on the current month if missing.
    pub fn session_for(&self, user: &User) -> Arc<RwLock<SchedulingSession>> {
        let entry = self.sessions.entry(user.id.clone()).or_insert_with(|| {
            tracing::debug!("Opening scheduling session for {}", user.email);
            Arc::new(RwLock::new(SchedulingSession::new(
                self.default_settings.clone(),
                local_now().date(),
            )))
        });
        Arc::clone(entry.value())
    }

    pub fn end_session(&self, user_id: &str) {
        if self.sessions.remove(user_id).is_some() {
            tracing::debug!("Closed scheduling session for {}", user_id);
        }
    }

    /// Revoke expired tokens and close sessions whose user holds no live token.
    /// Returns `(tokens, sessions)` removed.
    pub fn prune_expired(&self, now: NaiveDateTime) -> (usize, usize) {
        let tokens = self.auth.prune_expired(now);
        let active = self.auth.active_user_ids(now);
        let before = self.sessions.len();
        self.sessions.retain(|user_id, _| active.contains(user_id));
        (tokens, before.saturating_sub(self.sessions.len()))
    }
}

/// Wall-clock time in the server's local zone.
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Whitelist `frontend_url` (plus the Vite dev server) when configured,
/// otherwise allow any origin.
fn cors_layer(frontend_url: Option<&str>) -> anyhow::Result<CorsLayer> {
    let cors = match frontend_url {
        Some(url) => {
            let origins: Vec<axum::http::HeaderValue> =
                vec![url.parse()?, "http://localhost:5173".parse()?];
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };
    Ok(cors)
}

fn router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    // Public: health + account creation
    let public_routes = Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/auth/register", post(handlers::account::register))
        .route("/api/auth/login", post(handlers::account::login));

    // Bearer token required
    let session_routes = Router::new()
        .route("/api/auth/logout", post(handlers::account::logout))
        .route("/api/auth/me", get(handlers::account::me))
        .route(
            "/api/settings",
            get(handlers::settings::get_settings).put(handlers::settings::update_settings),
        )
        .route("/api/calendar", get(handlers::calendar::month))
        .route("/api/calendar/day", get(handlers::calendar::day))
        .route(
            "/api/appointments",
            get(handlers::appointments::list).post(handlers::appointments::create),
        )
        .route(
            "/api/appointments/sobreturno",
            post(handlers::appointments::create_sobreturno),
        )
        .route(
            "/api/appointments/{id}/cancel",
            post(handlers::appointments::cancel),
        )
        .route(
            "/api/appointments/{id}/confirm",
            post(handlers::appointments::confirm),
        );

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // ── Tracing ──
    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(tg) => Arc::new(TelegramNotifier::new(tg.bot_token.clone(), tg.chat_id)),
        None => {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set, notifications go to the log only");
            Arc::new(LogNotifier)
        }
    };

    let state = Arc::new(AppState::new(notifier));

    // ── Background task: appointment reminders ──
    tokio::spawn(reminders::run(state.clone(), config.reminder_check));

    let app = router(state, cors_layer(config.frontend_url.as_deref())?);

    let addr = config.addr();
    tracing::info!("NexTurn server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ── Tests ──

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use chrono::Datelike;
    use notify::tests::RecordingNotifier;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    pub(crate) fn test_state(notifier: Arc<dyn Notifier>) -> AppState {
        AppState::new(notifier)
    }

    fn app() -> (Router, Arc<AppState>, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let state = Arc::new(test_state(notifier.clone()));
        let cors = cors_layer(None).unwrap();
        (router(state.clone(), cors), state, notifier)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "name": "Dra. Laura Gómez",
                "email": "laura@email.com",
                "password": "secreto1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    fn form(date: &str, time: &str) -> Value {
        json!({
            "name": "María García",
            "phone": "+541122334466",
            "email": "maria@email.com",
            "date": date,
            "time": time,
            "notes": ""
        })
    }

    #[test]
    fn test_prune_closes_unreachable_sessions() {
        use chrono::TimeDelta;
        use ledger::tests::now;

        let state = test_state(Arc::new(RecordingNotifier::default()));
        let (_, ana) = state
            .auth
            .register("Ana Martínez", "ana@email.com", "secreto1", now())
            .unwrap();
        let (_, juan) = state
            .auth
            .register("Juan Pérez", "juan@email.com", "secreto1", now())
            .unwrap();
        state.session_for(&ana);
        state.session_for(&juan);
        state
            .auth
            .login("juan@email.com", "secreto1", now() + TimeDelta::hours(20))
            .unwrap();

        assert_eq!(state.prune_expired(now() + TimeDelta::hours(1)), (0, 0));
        assert_eq!(state.prune_expired(now() + TimeDelta::hours(25)), (2, 1));
        assert!(state.sessions.contains_key(&juan.id));
        assert!(!state.sessions.contains_key(&ana.id));
        assert_eq!(state.auth.token_count(), 1);
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = app();
        let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["users"], 0);
    }

    #[tokio::test]
    async fn test_session_routes_require_token() {
        let (app, _, _) = app();
        let (status, body) = send(&app, Method::GET, "/api/calendar", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["ok"], false);

        let (status, _) = send(&app, Method::GET, "/api/settings", Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_login_me() {
        let (app, state, _) = app();
        register(&app).await;
        assert_eq!(state.sessions.len(), 1);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "LAURA@email.com", "password": "secreto1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Dra. Laura Gómez");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Otra", "email": "laura@email.com", "password": "secreto2" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_month_calendar() {
        let (app, _, _) = app();
        let token = register(&app).await;

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/calendar?year=2026&month=10",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let days = body["data"]["days"].as_array().unwrap();
        assert_eq!(days.len(), 35);
        assert_eq!(days[0]["date"], "2026-09-27");
        assert_eq!(days[0]["is_disabled"], true);

        // Monday 19 October: full default day
        let monday = days.iter().find(|d| d["date"] == "2026-10-19").unwrap();
        assert_eq!(monday["slots"].as_array().unwrap().len(), 14);
        assert_eq!(monday["selectable"], true);

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/calendar?year=2026&month=13",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["days"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_calendar_defaults_to_session_month() {
        let (app, _, _) = app();
        let token = register(&app).await;

        let today = local_now().date();
        let (status, body) = send(&app, Method::GET, "/api/calendar", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["year"], today.year());
        assert_eq!(body["data"]["month"], today.month());

        send(
            &app,
            Method::GET,
            "/api/calendar?year=2026&month=10",
            Some(&token),
            None,
        )
        .await;
        let (_, body) = send(&app, Method::GET, "/api/calendar", Some(&token), None).await;
        assert_eq!(body["data"]["year"], 2026);
        assert_eq!(body["data"]["month"], 10);
        assert_eq!(body["data"]["days"].as_array().unwrap().len(), 35);
    }

    #[tokio::test]
    async fn test_booking_other_month_keeps_calendar() {
        let (app, _, _) = app();
        let token = register(&app).await;
        send(
            &app,
            Method::GET,
            "/api/calendar?year=2026&month=10",
            Some(&token),
            None,
        )
        .await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/appointments",
            Some(&token),
            Some(form("2026-11-03", "10:00")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, Method::GET, "/api/calendar", Some(&token), None).await;
        assert_eq!(body["data"]["month"], 10);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/appointments",
            Some(&token),
            Some(form("2026-11-03", "10:00")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_day_rejects_malformed_date() {
        let (app, _, _) = app();
        let token = register(&app).await;
        let (status, body) = send(
            &app,
            Method::GET,
            "/api/calendar/day?date=garbage",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "Fecha inválida");
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_book_blocks_slot() {
        let (app, _, notifier) = app();
        let token = register(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/appointments",
            Some(&token),
            Some(form("2026-10-20", "10:00")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["appointment"]["status"], "pending");
        assert_eq!(body["data"]["play_sound"], "default");
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/appointments",
            Some(&token),
            Some(form("2026-10-20", "10:00")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = send(
            &app,
            Method::GET,
            "/api/calendar/day?date=2026-10-20",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["data"]["status"], "pending");
        let slot = body["data"]["slots"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["time"] == "10:00")
            .unwrap()
            .clone();
        assert_eq!(slot["available"], false);
    }

    #[tokio::test]
    async fn test_booking_on_closed_day_conflicts() {
        let (app, _, _) = app();
        let token = register(&app).await;

        // Saturday
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/appointments",
            Some(&token),
            Some(form("2026-10-24", "10:00")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/appointments/sobreturno",
            Some(&token),
            Some(form("2026-10-24", "10:00")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["appointment"]["status"], "sobreturno");
    }

    #[tokio::test]
    async fn test_invalid_form_rejected() {
        let (app, _, _) = app();
        let token = register(&app).await;
        let mut bad = form("2026-10-20", "10:00");
        bad["phone"] = json!("12-34");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/appointments",
            Some(&token),
            Some(bad),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Ingresa un número de teléfono válido");
    }

    #[tokio::test]
    async fn test_cancel_frees_slot() {
        let (app, _, _) = app();
        let token = register(&app).await;
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/appointments",
            Some(&token),
            Some(form("2026-10-20", "10:00")),
        )
        .await;
        let id = body["data"]["appointment"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/appointments/{}/cancel", id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "cancelled");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/appointments",
            Some(&token),
            Some(form("2026-10-20", "10:00")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(
            &app,
            Method::GET,
            "/api/appointments?date=2026-10-20",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/appointments/unknown/cancel",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_confirm() {
        let (app, _, _) = app();
        let token = register(&app).await;
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/appointments",
            Some(&token),
            Some(form("2026-10-21", "09:30")),
        )
        .await;
        let id = body["data"]["appointment"]["id"].as_str().unwrap().to_string();

        let (_, body) = send(
            &app,
            Method::POST,
            &format!("/api/appointments/{}/confirm", id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["data"]["status"], "confirmed");
    }

    #[tokio::test]
    async fn test_settings_update_rebuilds_calendar() {
        let (app, _, _) = app();
        let token = register(&app).await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/settings",
            Some(&token),
            Some(json!({
                "schedule": {
                    "work_days": [6],
                    "work_hours": { "start": "10:00", "end": "12:00" },
                    "break_time": { "start": "11:00", "end": "11:30" },
                    "slot_duration": 30
                },
                "notifications": {
                    "confirmation_enabled": false,
                    "reminder_enabled": true,
                    "reminder_hours_before": 2,
                    "sound_enabled": false,
                    "notification_sound": "bell"
                }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["profession"], "Médico");

        let (_, body) = send(
            &app,
            Method::GET,
            "/api/calendar/day?date=2026-10-24",
            Some(&token),
            None,
        )
        .await;
        let times: Vec<&str> = body["data"]["slots"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["time"].as_str().unwrap())
            .collect();
        assert_eq!(times, vec!["10:00", "10:30", "11:30"]);

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/appointments",
            Some(&token),
            Some(form("2026-10-24", "10:30")),
        )
        .await;
        assert!(body["data"].get("play_sound").is_none());
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let (app, _, _) = app();
        let token = register(&app).await;

        let (status, _) = send(
            &app,
            Method::PUT,
            "/api/settings",
            Some(&token),
            Some(json!({ "profession": "X" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, Method::GET, "/api/settings", Some(&token), None).await;
        assert_eq!(body["data"]["profession"], "Médico");
    }

    #[tokio::test]
    async fn test_logout_drops_session() {
        let (app, state, _) = app();
        let token = register(&app).await;
        send(
            &app,
            Method::POST,
            "/api/appointments",
            Some(&token),
            Some(form("2026-10-20", "10:00")),
        )
        .await;

        let (status, _) = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.sessions.is_empty());

        let (status, _) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "laura@email.com", "password": "secreto1" })),
        )
        .await;
        let token = body["data"]["token"].as_str().unwrap().to_string();
        let (_, body) = send(&app, Method::GET, "/api/appointments", Some(&token), None).await;
        assert!(body["data"].as_array().unwrap().is_empty());
    }
}
