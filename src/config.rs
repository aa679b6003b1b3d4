use std::collections::HashMap;
use std::env;

/// Name of the setting that hides the `is_public` flag of individual photos.
pub const PUBLIC_PHOTOS_HIDDEN: &str = "public_photos_hidden";

/// Environment variables with this prefix are loaded as named settings.
const SETTING_PREFIX: &str = "SETTING_";

/// Settings
///
/// Read-only lookup of named gallery settings. How they are stored is up to
/// the implementation; the authorization rules only ever read them.
pub trait Settings: Send + Sync {
    /// Returns `default` when the setting is unset or cannot be read as a
    /// boolean.
    fn get_bool(&self, name: &str, default: bool) -> bool;
}

/// AppConfig
///
/// Holds the configuration of the process. Immutable once loaded and cheap to
/// clone into every request that needs it.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Selects the log format.
    pub env: Env,
    // Postgres connection string, when the Postgres store is used.
    pub db_url: Option<String>,
    // Named gallery settings, keyed by lower-case name.
    settings: HashMap<String, String>,
}

/// Env
///
/// The runtime context: human-readable logs locally, JSON in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// A config with no settings at all, so every lookup yields its default.
    /// Used for test setup without touching the process environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            settings: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the process environment (after applying a
    /// `.env` file, if present).
    ///
    /// * `APP_ENV`: `production` selects [`Env::Production`], anything else is local.
    /// * `DATABASE_URL`: optional Postgres connection string.
    /// * `SETTING_<NAME>`: loaded as setting `<name>`, e.g.
    ///   `SETTING_PUBLIC_PHOTOS_HIDDEN=0`.
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let settings = env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(SETTING_PREFIX)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name.to_ascii_lowercase(), value))
            })
            .collect::<HashMap<_, _>>();

        tracing::debug!(?env, settings = settings.len(), "configuration loaded");

        Self {
            env,
            db_url: env::var("DATABASE_URL").ok(),
            settings,
        }
    }

    /// Overrides a single setting.
    pub fn with_setting(mut self, name: &str, value: impl Into<String>) -> Self {
        self.settings.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// The raw value of a setting, if set.
    pub fn setting(&self, name: &str) -> Option<&str> {
        self.settings
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether `is_public` on single photos is ignored. Hidden by default.
    pub fn public_photos_hidden(&self) -> bool {
        self.get_bool(PUBLIC_PHOTOS_HIDDEN, true)
    }
}

impl Settings for AppConfig {
    fn get_bool(&self, name: &str, default: bool) -> bool {
        let Some(raw) = self.setting(name) else {
            return default;
        };

        match parse_bool(raw) {
            Some(value) => value,
            None => {
                tracing::warn!(setting = name, value = raw, "not a boolean, using default");
                default
            }
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
