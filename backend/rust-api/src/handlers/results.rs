use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::{
    extractors::{AppJson, ValidJson},
    handlers::{
        download,
        error::{parse_object_id, ApiError},
        Envelope,
    },
    middlewares::auth::JwtClaims,
    models::result::{SaveResultRequest, UpdateResultRequest},
    services::{
        export_service::{self, ExportFormat},
        result_service::ResultService,
        AppState,
    },
};

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// POST /api/users/results - Score and store a submitted exam
pub async fn save_result(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SaveResultRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(exam_id), Some(answers)) = (req.exam_id.filter(|id| !id.is_empty()), req.answers)
    else {
        return Err(ApiError::bad_request("Please provide examId and answers"));
    };
    let exam_id = parse_object_id(&exam_id, "examId")?;

    let result = ResultService::new(state.mongo.clone())
        .save_result(claims.user_id()?, exam_id, answers)
        .await?;
    Ok((StatusCode::CREATED, Envelope::ok(result)))
}

/// GET /api/users/results/exam/{examId}
pub async fn results_by_exam(
    State(state): State<Arc<AppState>>,
    Path(exam_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let exam_id = parse_object_id(&exam_id, "examId")?;
    let results = ResultService::new(state.mongo.clone())
        .results_for_exam(&exam_id)
        .await?;
    Ok(Envelope::ok(results))
}

/// GET /api/users/results/user
pub async fn my_results(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let results = ResultService::new(state.mongo.clone())
        .results_for_student(&claims.user_id()?)
        .await?;
    Ok(Envelope::ok(results))
}

/// GET /api/users/results/all
pub async fn all_results(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let results = ResultService::new(state.mongo.clone()).all_results().await?;
    Ok(Envelope::ok(results))
}

/// GET /api/users/results/{id}
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result_id = parse_object_id(&id, "result id")?;
    let result = ResultService::new(state.mongo.clone())
        .get_result(&result_id, &claims)
        .await?;
    Ok(Envelope::ok(result))
}

/// PUT /api/users/results/{id} - Manual grading
pub async fn update_result(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateResultRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result_id = parse_object_id(&id, "result id")?;
    let result = ResultService::new(state.mongo.clone())
        .update_result(&result_id, req, claims.user_id()?)
        .await?;
    Ok(Envelope::ok(result))
}

/// PUT /api/users/results/{id}/toggle-visibility
pub async fn toggle_visibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result_id = parse_object_id(&id, "result id")?;
    let toggled = ResultService::new(state.mongo.clone())
        .toggle_visibility(&result_id)
        .await?;
    Ok(Envelope::ok(toggled))
}

/// DELETE /api/users/results/{id}
pub async fn delete_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result_id = parse_object_id(&id, "result id")?;
    ResultService::new(state.mongo.clone())
        .delete_result(&result_id)
        .await?;
    Ok(Json(json!({ "success": true, "message": "Result deleted successfully" })))
}

/// GET /api/users/results/export?format=csv|xlsx
pub async fn export_results(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = ExportFormat::parse(query.format.as_deref())
        .ok_or_else(|| ApiError::bad_request("Unsupported export format, use csv or xlsx"))?;

    let results = ResultService::new(state.mongo.clone()).all_results().await?;
    let bytes = export_service::results_export(&results, format)?;

    tracing::info!(format = format.as_label(), rows = results.len(), "Results exported");
    Ok(download(bytes, format.content_type(), format.results_filename()))
}
