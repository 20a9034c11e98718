use std::env;
use std::time::Duration;

/// Default reminder scan interval (seconds).
const DEFAULT_REMINDER_CHECK_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origin; any origin when unset.
    pub frontend_url: Option<String>,
    pub telegram: Option<TelegramConfig>,
    pub reminder_check: Duration,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

impl ServerConfig {
    /// Read configuration from the environment (after `dotenvy` has loaded `.env`).
    pub fn from_env() -> anyhow::Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = match env::var("PORT") {
            Ok(p) => p
                .parse()
                .map_err(|e| anyhow::anyhow!("PORT must be a number: {}", e))?,
            Err(_) => 3000,
        };

        let frontend_url = env::var("FRONTEND_URL").ok().filter(|u| !u.is_empty());

        let bot_token = env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        let telegram = if bot_token.is_empty() {
            None
        } else {
            let chat_id = env::var("TELEGRAM_CHAT_ID")
                .map_err(|_| anyhow::anyhow!("TELEGRAM_CHAT_ID must be set with TELEGRAM_BOT_TOKEN"))?
                .parse()
                .map_err(|e| anyhow::anyhow!("TELEGRAM_CHAT_ID must be a number: {}", e))?;
            Some(TelegramConfig { bot_token, chat_id })
        };

        let reminder_secs = match env::var("REMINDER_CHECK_SECS") {
            Ok(s) => s
                .parse()
                .map_err(|e| anyhow::anyhow!("REMINDER_CHECK_SECS must be a number: {}", e))?,
            Err(_) => DEFAULT_REMINDER_CHECK_SECS,
        };

        Ok(Self {
            host,
            port,
            frontend_url,
            telegram,
            reminder_check: Duration::from_secs(reminder_secs.max(1)),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
