use std::{env, str::FromStr};

use anyhow::{Context, Result};
use chrono::Duration;
use tracing::warn;

pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://database.sqlite";
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_APP_TITLE: &str = "AI Misinformation Detector";
const DEFAULT_JWT_SECRET: &str = "your-secret-key";
const DEFAULT_JWT_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_PORT: u16 = 3000;

/// Process-level configuration, resolved once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub port: u16,
    pub llm: LlmSettings,
    pub default_model: String,
    pub seed_admin: Option<SeedAdmin>,
}

#[derive(Clone, Debug)]
pub struct LlmSettings {
    pub base_url: String,
    pub referer: Option<String>,
    pub title: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            referer: None,
            title: Some(DEFAULT_APP_TITLE.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SeedAdmin {
    pub username: String,
    pub password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            non_empty_var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let jwt_secret = match non_empty_var("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET is not set; falling back to the built-in development secret");
                DEFAULT_JWT_SECRET.to_string()
            }
        };

        let jwt_ttl = match non_empty_var("JWT_TTL_SECONDS") {
            Some(raw) => Duration::seconds(
                parse_var::<i64>("JWT_TTL_SECONDS", &raw)?.max(1),
            ),
            None => Duration::seconds(DEFAULT_JWT_TTL_SECONDS),
        };

        let port = match non_empty_var("PORT") {
            Some(raw) => parse_var::<u16>("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        let llm = LlmSettings {
            base_url: non_empty_var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string()),
            referer: non_empty_var("OPENROUTER_HTTP_REFERER"),
            title: non_empty_var("OPENROUTER_X_TITLE").or_else(|| Some(DEFAULT_APP_TITLE.into())),
        };

        let default_model =
            non_empty_var("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let seed_admin = match (non_empty_var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD").ok()) {
            (Some(username), Some(password)) if !password.is_empty() => {
                Some(SeedAdmin { username, password })
            }
            (Some(_), _) => {
                warn!("ADMIN_USERNAME is set without ADMIN_PASSWORD; skipping admin seeding");
                None
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_ttl,
            port,
            llm,
            default_model,
            seed_admin,
        })
    }

    /// Configuration suitable for tests: throwaway secret, local database path.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            jwt_secret: "test-signing-secret".to_string(),
            jwt_ttl: Duration::seconds(DEFAULT_JWT_TTL_SECONDS),
            port: DEFAULT_PORT,
            llm: LlmSettings::default(),
            default_model: DEFAULT_MODEL.to_string(),
            seed_admin: None,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("{key} must be a valid number, got {raw:?}"))
}
