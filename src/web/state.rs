use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    config::{AppConfig, SeedAdmin},
    db,
    llm::LlmClient,
    web::auth::{self, AuthTokens},
};

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    llm: LlmClient,
    tokens: AuthTokens,
    default_model: Arc<str>,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let pool = db::connect(&config.database_url)
            .await
            .context("failed to initialize the store")?;

        Ok(Self::from_parts(pool, config))
    }

    /// Assemble state around an already opened pool.
    pub fn from_parts(pool: SqlitePool, config: &AppConfig) -> Self {
        Self {
            pool,
            llm: LlmClient::new(config.llm.clone()),
            tokens: AuthTokens::new(config.jwt_secret.as_bytes(), config.jwt_ttl),
            default_model: Arc::from(config.default_model.as_str()),
        }
    }

    /// Create the configured admin account, or reset its password if it exists.
    pub async fn ensure_seed_admin(&self, seed: Option<&SeedAdmin>) -> Result<()> {
        let Some(seed) = seed else {
            return Ok(());
        };

        let password_hash = auth::hash_password(&seed.password)
            .map_err(|err| anyhow!("failed to hash seed admin password: {err}"))?;

        let updated = sqlx::query("UPDATE users SET password = ? WHERE username = ?")
            .bind(&password_hash)
            .bind(&seed.username)
            .execute(&self.pool)
            .await
            .context("failed to update seed admin password")?;

        if updated.rows_affected() > 0 {
            info!(username = %seed.username, "seed admin already present; password updated");
            return Ok(());
        }

        sqlx::query("INSERT INTO users (username, password) VALUES (?, ?)")
            .bind(&seed.username)
            .bind(&password_hash)
            .execute(&self.pool)
            .await
            .context("failed to insert seed admin user")?;

        info!(username = %seed.username, "seeded admin user");
        Ok(())
    }

    pub fn llm_client(&self) -> &LlmClient {
        &self.llm
    }

    pub fn pool_ref(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tokens(&self) -> &AuthTokens {
        &self.tokens
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}
