use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::info;

use crate::{
    error::{AppError, Result},
    web::{
        AppState, AuthUser,
        auth::{self, username_taken},
        responses::Success,
    },
};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: Option<String>,
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<AuthUser>>> {
    let users = sqlx::query_as::<_, AuthUser>("SELECT id, username FROM users ORDER BY id")
        .fetch_all(state.pool_ref())
        .await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(form), _): WithRejection<Json<CreateUserRequest>, AppError>,
) -> Result<(StatusCode, Json<AuthUser>)> {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return Err(AppError::Validation(
            "Username and password are required".to_string(),
        ));
    }

    let password_hash = auth::hash_or_internal(&form.password)?;
    let user = auth::insert_user(state.pool_ref(), username, &password_hash).await?;

    info!(user_id = user.id, "admin created user");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Rename a user; the password is re-hashed only when a new one is given.
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    WithRejection(Json(form), _): WithRejection<Json<UpdateUserRequest>, AppError>,
) -> Result<Json<AuthUser>> {
    let username = form.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }

    let clash: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ? AND id != ?")
        .bind(username)
        .bind(id)
        .fetch_optional(state.pool_ref())
        .await?;
    if clash.is_some() {
        return Err(username_taken());
    }

    let new_password = form.password.as_deref().filter(|password| !password.is_empty());
    let result = match new_password {
        Some(password) => {
            let password_hash = auth::hash_or_internal(password)?;
            sqlx::query("UPDATE users SET username = ?, password = ? WHERE id = ?")
                .bind(username)
                .bind(password_hash)
                .bind(id)
                .execute(state.pool_ref())
                .await
        }
        None => {
            sqlx::query("UPDATE users SET username = ? WHERE id = ?")
                .bind(username)
                .bind(id)
                .execute(state.pool_ref())
                .await
        }
    };

    match result {
        Ok(done) if done.rows_affected() > 0 => Ok(Json(AuthUser {
            id,
            username: username.to_string(),
        })),
        Ok(_) => Err(AppError::NotFound("User not found".to_string())),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(username_taken()),
        Err(err) => Err(err.into()),
    }
}

/// Delete a user; their settings and scans go with them.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Success>> {
    let done = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(state.pool_ref())
        .await?;

    if done.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    info!(user_id = id, "admin deleted user");
    Ok(Json(Success::default()))
}
