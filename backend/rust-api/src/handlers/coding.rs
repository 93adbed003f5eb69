use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    extractors::ValidJson,
    handlers::error::{parse_object_id, ApiError},
    middlewares::auth::JwtClaims,
    models::coding::{
        CodingQuestionRequest, CodingQuestionResponse, CodingSubmissionView, Language,
        RunCodeRequest, SubmitCodeRequest,
    },
    services::{
        code_runner::{self, RUN_TIMEOUT},
        coding_service::CodingService,
        AppState,
    },
};

/// POST /api/coding/questions
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<CodingQuestionRequest>,
) -> Result<(StatusCode, Json<CodingQuestionResponse>), ApiError> {
    let exam_id = parse_object_id(&req.exam_id, "examId")?;
    let question = CodingService::new(state.mongo.clone())
        .create_question(exam_id, req, claims.user_id()?)
        .await?;
    Ok((StatusCode::CREATED, Json(question.into())))
}

/// GET /api/coding/questions/exam/{examId}
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Path(exam_id): Path<String>,
) -> Result<Json<Vec<CodingQuestionResponse>>, ApiError> {
    let exam_id = parse_object_id(&exam_id, "examId")?;
    let questions = CodingService::new(state.mongo.clone())
        .list_questions(&exam_id)
        .await?;
    Ok(Json(questions.into_iter().map(Into::into).collect()))
}

/// POST /api/coding/submit
pub async fn submit_code(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<SubmitCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let submission = CodingService::new(state.mongo.clone())
        .submit(claims.user_id()?, req)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Code submitted successfully",
            "submission": CodingSubmissionView::new(submission, None),
        })),
    ))
}

/// GET /api/coding/submissions/{examId} - the caller's own submissions
pub async fn my_submissions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(exam_id): Path<String>,
) -> Result<Json<Vec<CodingSubmissionView>>, ApiError> {
    let exam_id = parse_object_id(&exam_id, "examId")?;
    let submissions = CodingService::new(state.mongo.clone())
        .submissions_for(&exam_id, &claims.user_id()?)
        .await?;
    Ok(Json(submissions))
}

/// POST /api/coding/run/{language}
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    Path(language): Path<String>,
    ValidJson(req): ValidJson<RunCodeRequest>,
) -> Result<Response, ApiError> {
    if !state.config.code_execution_enabled {
        return Ok((
            StatusCode::FORBIDDEN,
            Json(json!({
                "message": "Code execution disabled in production for security",
                "note": "This feature is only available in development mode"
            })),
        )
            .into_response());
    }

    let language: Language = language.parse().map_err(ApiError::BadRequest)?;
    let outcome = code_runner::run_code(language, &req.code, RUN_TIMEOUT).await?;
    Ok(Json(outcome).into_response())
}
