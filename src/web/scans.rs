use axum::{Extension, Json, extract::State};
use axum_extra::extract::WithRejection;
use tracing::info;

use crate::{
    analysis::{self, AnalysisInput, AnalysisOutcome},
    error::{AppError, Result},
    history::{self, ScanRecord, ScanStats},
    web::{AppState, AuthUser, responses::Success},
};

pub async fn list_scans(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<ScanRecord>>> {
    let scans = history::list_history(state.pool_ref(), user.id).await?;
    Ok(Json(scans))
}

/// Store a result the client produced itself.
pub async fn save_scan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(scan), _): WithRejection<Json<ScanRecord>, AppError>,
) -> Result<Json<Success>> {
    history::insert_scan(state.pool_ref(), Some(user.id), &scan).await?;
    info!(user_id = user.id, scan_id = %scan.id, "saved client scan");
    Ok(Json(Success::default()))
}

pub async fn scan_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ScanStats>> {
    let stats = history::get_stats(state.pool_ref(), user.id).await?;
    Ok(Json(stats))
}

/// Analyze with the caller's own key and file the scan under their history.
pub async fn analyze(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(input), _): WithRejection<Json<AnalysisInput>, AppError>,
) -> Result<Json<AnalysisOutcome>> {
    let outcome = analysis::analyze(
        state.pool_ref(),
        state.llm_client(),
        state.default_model(),
        input,
        Some(user.id),
    )
    .await?;

    Ok(Json(outcome))
}
