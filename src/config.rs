use crate::error::{config_error, env_error, AppResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Default port for the web interface
pub const DEFAULT_PORT: u16 = 3000;

/// Default location of the persisted auth session
pub const DEFAULT_SESSION_FILE: &str = ".daybook/session.json";

/// Optional settings file, merged under the environment
pub const SETTINGS_FILE: &str = "config/daybook.toml";

/// How the calendar view loads the events of the visible grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MonthFetch {
    /// One ranged query covering all 42 cells
    #[default]
    Range,
    /// One query per visible cell, issued concurrently
    PerDay,
}

impl std::str::FromStr for MonthFetch {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "range" => Ok(MonthFetch::Range),
            "per_day" | "per-day" => Ok(MonthFetch::PerDay),
            other => Err(config_error(&format!("Unknown MONTH_FETCH value: {}", other))),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the hosted backend (e.g. https://xyz.example.co)
    pub backend_url: String,
    /// Public (anon) API key of the backend
    pub backend_anon_key: String,
    /// Address the web interface binds to
    pub bind_address: String,
    /// Port the web interface listens on
    pub port: u16,
    /// Secret for signing the browser session cookie; random per process when unset
    pub jwt_secret: Option<String>,
    /// Lifetime of the browser session cookie in minutes
    pub session_ttl_minutes: i64,
    /// Where the backend auth session is persisted between runs
    pub session_file: Option<PathBuf>,
    /// Timezone used to decide what "today" is
    pub timezone: String,
    /// Calendar loading strategy
    pub month_fetch: MonthFetch,
    /// Refresh the access token this many seconds before it expires
    pub token_refresh_margin_secs: i64,
    /// Open the calendar in a browser once the server is up
    pub open_browser: bool,
}

/// Non-secret settings that may come from `config/daybook.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileSettings {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub session_ttl_minutes: Option<i64>,
    pub session_file: Option<String>,
    pub timezone: Option<String>,
    pub month_fetch: Option<MonthFetch>,
    pub token_refresh_margin_secs: Option<i64>,
    pub open_browser: Option<bool>,
}

impl Config {
    /// Load configuration from `.env`, the settings file and the environment
    pub fn load() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let file = match fs::read_to_string(SETTINGS_FILE) {
            Ok(content) => Some(toml::from_str::<FileSettings>(&content)?),
            Err(_) => None,
        };

        Self::from_sources(|key| env::var(key).ok(), file.unwrap_or_default())
    }

    /// Build a config from an environment lookup and file settings.
    ///
    /// Environment values win over file values, which win over defaults.
    pub fn from_sources<F>(lookup: F, file: FileSettings) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> AppResult<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| env_error(key))
        };

        let backend_url = required("BACKEND_URL")?;
        let backend_anon_key = required("BACKEND_ANON_KEY")?;
        url::Url::parse(&backend_url)?;

        let bind_address = lookup("BIND_ADDRESS")
            .or(file.bind_address)
            .unwrap_or_else(|| "127.0.0.1".to_string());

        let port = match lookup("PORT") {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| config_error("Invalid PORT format"))?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        };

        let session_ttl_minutes = match lookup("SESSION_TTL_MINUTES") {
            Some(v) => v
                .parse::<i64>()
                .map_err(|_| config_error("Invalid SESSION_TTL_MINUTES format"))?,
            None => file.session_ttl_minutes.unwrap_or(60 * 24),
        };

        // An empty value disables persistence
        let session_file = match lookup("SESSION_FILE").or(file.session_file) {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_SESSION_FILE)),
        };

        let timezone = lookup("TIMEZONE")
            .or(file.timezone)
            .unwrap_or_else(|| String::from("UTC"));
        timezone
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Invalid TIMEZONE: {}", timezone)))?;

        let month_fetch = match lookup("MONTH_FETCH") {
            Some(v) => v.parse::<MonthFetch>()?,
            None => file.month_fetch.unwrap_or_default(),
        };

        let token_refresh_margin_secs = match lookup("TOKEN_REFRESH_MARGIN_SECS") {
            Some(v) => v
                .parse::<i64>()
                .map_err(|_| config_error("Invalid TOKEN_REFRESH_MARGIN_SECS format"))?,
            None => file.token_refresh_margin_secs.unwrap_or(60),
        };

        let open_browser = match lookup("OPEN_BROWSER") {
            Some(v) => matches!(v.trim(), "1" | "true" | "yes"),
            None => file.open_browser.unwrap_or(false),
        };

        Ok(Config {
            backend_url,
            backend_anon_key,
            bind_address,
            port,
            jwt_secret: lookup("JWT_SECRET").filter(|s| !s.is_empty()),
            session_ttl_minutes,
            session_file,
            timezone,
            month_fetch,
            token_refresh_margin_secs,
            open_browser,
        })
    }

    /// Parsed timezone; validated at load time so the fallback is never hit in practice
    pub fn tz(&self) -> Tz {
        self.timezone.parse::<Tz>().unwrap_or(chrono_tz::UTC)
    }
}
