use axum::{Json, extract::State};
use axum_extra::extract::WithRejection;

use crate::{
    analysis::{self, AnalysisInput, AnalysisOutcome},
    error::{AppError, Result},
    web::AppState,
};

/// Anonymous analysis, funded by the first configured key in the store.
pub async fn analyze(
    State(state): State<AppState>,
    WithRejection(Json(input), _): WithRejection<Json<AnalysisInput>, AppError>,
) -> Result<Json<AnalysisOutcome>> {
    let outcome = analysis::analyze(
        state.pool_ref(),
        state.llm_client(),
        state.default_model(),
        input,
        None,
    )
    .await?;

    Ok(Json(outcome))
}
