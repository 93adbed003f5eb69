use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    extractors::ValidJson,
    handlers::error::{parse_object_id, ApiError},
    middlewares::auth::JwtClaims,
    models::cheating_log::{CheatingLogView, SaveCheatingLogRequest},
    services::{cheating_log_service::CheatingLogService, AppState},
};

/// POST /api/users/cheatingLogs
pub async fn save_log(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<SaveCheatingLogRequest>,
) -> Result<(StatusCode, Json<CheatingLogView>), ApiError> {
    let exam_id = parse_object_id(&req.exam_id, "examId")?;
    let log = CheatingLogService::new(state.mongo.clone())
        .save_log(claims.user_id()?, exam_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// GET /api/users/cheatingLogs/{examId}
pub async fn logs_for_exam(
    State(state): State<Arc<AppState>>,
    Path(exam_id): Path<String>,
) -> Result<Json<Vec<CheatingLogView>>, ApiError> {
    let exam_id = parse_object_id(&exam_id, "examId")?;
    let logs = CheatingLogService::new(state.mongo.clone())
        .logs_for_exam(&exam_id)
        .await?;
    Ok(Json(logs))
}
