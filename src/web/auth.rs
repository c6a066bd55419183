use anyhow::anyhow;
use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::WithRejection;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::{
    error::{AppError, Result},
    web::AppState,
};

/// Token claims: the user's identity plus issue and expiry times (Unix seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Identity attached to every request that passed `require_auth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

#[derive(Clone, sqlx::FromRow)]
pub struct DbUserAuth {
    pub id: i64,
    pub username: String,
    pub password: String,
}

/// Signs and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct AuthTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl AuthTokens {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, user: &AuthUser) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            id: user.id,
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| AppError::Internal(anyhow!("failed to sign token: {err}")))
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| AppError::Unauthorized("Invalid token"))?;

        Ok(AuthUser {
            id: data.claims.id,
            username: data.claims.username,
        })
    }
}

pub fn hash_password(password: &str) -> std::result::Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub(crate) fn hash_or_internal(password: &str) -> Result<String> {
    hash_password(password)
        .map_err(|err| AppError::Internal(anyhow!("failed to hash password: {err}")))
}

pub async fn fetch_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> sqlx::Result<Option<DbUserAuth>> {
    sqlx::query_as::<_, DbUserAuth>("SELECT id, username, password FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_user_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<AuthUser>> {
    sqlx::query_as::<_, AuthUser>("SELECT id, username FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Insert a user with an already hashed password; duplicates become `Conflict`.
pub async fn insert_user(pool: &SqlitePool, username: &str, password_hash: &str) -> Result<AuthUser> {
    if fetch_user_by_username(pool, username).await?.is_some() {
        return Err(username_taken());
    }

    let result = sqlx::query("INSERT INTO users (username, password) VALUES (?, ?)")
        .bind(username)
        .bind(password_hash)
        .execute(pool)
        .await;

    match result {
        Ok(done) => Ok(AuthUser {
            id: done.last_insert_rowid(),
            username: username.to_string(),
        }),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(username_taken()),
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn username_taken() -> AppError {
    AppError::Conflict("Username already exists".to_string())
}

#[derive(Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl CredentialsRequest {
    fn validated(&self) -> Result<(&str, &str)> {
        let username = self.username.trim();
        if username.is_empty() || self.password.is_empty() {
            return Err(AppError::Validation(
                "Username and password are required".to_string(),
            ));
        }
        Ok((username, self.password.as_str()))
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: AuthUser,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: AuthUser,
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<CredentialsRequest>, AppError>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let (username, password) = body.validated()?;

    let password_hash = hash_or_internal(password)?;
    let user = insert_user(state.pool_ref(), username, &password_hash).await?;
    let token = state.tokens().issue(&user)?;

    info!(user_id = user.id, "registered new user");
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<CredentialsRequest>, AppError>,
) -> Result<Json<AuthResponse>> {
    let (username, password) = body.validated()?;

    let Some(record) = fetch_user_by_username(state.pool_ref(), username).await? else {
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &record.password) {
        warn!(user_id = record.id, "rejected login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let user = AuthUser {
        id: record.id,
        username: record.username,
    };
    let token = state.tokens().issue(&user)?;
    Ok(Json(AuthResponse { token, user }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let user = fetch_user_by_id(state.pool_ref(), identity.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(MeResponse { user }))
}

/// Guard shared by every protected route: verifies the bearer token and
/// attaches the caller's [`AuthUser`] to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AppError::Unauthorized("No token provided"))?;

    let token = header_value
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthorized("Invalid token"))?;

    let user = state.tokens().verify(token)?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
