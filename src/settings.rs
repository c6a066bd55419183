use serde::Serialize;
use sqlx::SqlitePool;

/// Per-user LLM settings as returned to clients. Absent values read as "".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserSettings {
    pub api_key: String,
    pub model: String,
}

/// An API key that can fund an analysis call, plus the model its owner chose.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Credential {
    pub user_id: i64,
    pub api_key: String,
    pub model: Option<String>,
}

pub async fn get_settings(pool: &SqlitePool, user_id: i64) -> sqlx::Result<UserSettings> {
    let row: Option<(Option<String>, Option<String>)> =
        sqlx::query_as("SELECT api_key, model FROM settings WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(row
        .map(|(api_key, model)| UserSettings {
            api_key: api_key.unwrap_or_default(),
            model: model.unwrap_or_default(),
        })
        .unwrap_or_default())
}

/// Insert-or-overwrite the caller's settings row.
///
/// Blank keys are stored as NULL; a blank model falls back to `default_model`.
pub async fn save_settings(
    pool: &SqlitePool,
    user_id: i64,
    api_key: Option<&str>,
    model: Option<&str>,
    default_model: &str,
) -> sqlx::Result<()> {
    let api_key = api_key.map(str::trim).filter(|key| !key.is_empty());
    let model = model
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .unwrap_or(default_model);

    sqlx::query(
        "INSERT INTO settings (user_id, api_key, model) VALUES (?, ?, ?)
         ON CONFLICT (user_id) DO UPDATE SET api_key = excluded.api_key, model = excluded.model",
    )
    .bind(user_id)
    .bind(api_key)
    .bind(model)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn credential_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> sqlx::Result<Option<Credential>> {
    sqlx::query_as::<_, Credential>(
        "SELECT user_id, api_key, model FROM settings
         WHERE user_id = ? AND api_key IS NOT NULL AND api_key != ''",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// First configured key in the store, used to fund anonymous analysis.
pub async fn pooled_credential(pool: &SqlitePool) -> sqlx::Result<Option<Credential>> {
    sqlx::query_as::<_, Credential>(
        "SELECT user_id, api_key, model FROM settings
         WHERE api_key IS NOT NULL AND api_key != ''
         ORDER BY user_id
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}
