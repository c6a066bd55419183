use axum::{Extension, Json, extract::State};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    settings::{self, UserSettings},
    web::{AppState, AuthUser, responses::Success},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSettingsRequest {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

pub async fn get_settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserSettings>> {
    let stored = settings::get_settings(state.pool_ref(), user.id).await?;
    Ok(Json(stored))
}

pub async fn save_settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(body), _): WithRejection<Json<SaveSettingsRequest>, AppError>,
) -> Result<Json<Success>> {
    settings::save_settings(
        state.pool_ref(),
        user.id,
        body.api_key.as_deref(),
        body.model.as_deref(),
        state.default_model(),
    )
    .await?;

    Ok(Json(Success::default()))
}
