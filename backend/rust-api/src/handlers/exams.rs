use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    extractors::ValidJson,
    handlers::error::{parse_object_id, ApiError},
    middlewares::auth::JwtClaims,
    models::{
        exam::{CreateExamRequest, ExamResponse, UpdateExamRequest},
        question::{QuestionRequest, QuestionResponse},
    },
    services::{exam_service::ExamService, question_service::QuestionService, AppState},
};

/// POST /api/users/exam
pub async fn create_exam(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<CreateExamRequest>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    let teacher_id = claims.user_id()?;
    let exam = ExamService::new(state.mongo.clone())
        .create_exam(req, teacher_id)
        .await?;
    Ok((StatusCode::CREATED, Json(exam)))
}

/// GET /api/users/exam
pub async fn list_exams(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    let exams = ExamService::new(state.mongo.clone()).list_exams().await?;
    Ok(Json(exams))
}

/// GET /api/users/exam/{id}
pub async fn get_exam(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam_id = parse_object_id(&id, "examId")?;
    let exam = ExamService::new(state.mongo.clone())
        .get_exam(&exam_id)
        .await?;
    Ok(Json(ExamResponse::from(exam)))
}

/// PUT /api/users/exam/{id}
pub async fn update_exam(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateExamRequest>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam_id = parse_object_id(&id, "examId")?;
    let exam = ExamService::new(state.mongo.clone())
        .update_exam(&exam_id, req)
        .await?;
    Ok(Json(exam))
}

/// DELETE /api/users/exam/{id}
pub async fn delete_exam(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let exam_id = parse_object_id(&id, "examId")?;
    ExamService::new(state.mongo.clone())
        .delete_exam(&exam_id)
        .await?;
    Ok(Json(json!({ "message": "Exam deleted successfully" })))
}

/// POST /api/users/exam/{id}/questions
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<QuestionRequest>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    let exam_id = parse_object_id(&id, "examId")?;
    let question = QuestionService::new(state.mongo.clone())
        .create_question(&exam_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(QuestionResponse::for_teacher(question))))
}

/// GET /api/users/exam/{id}/questions
///
/// Teachers get the answer key, everyone else the exam-taking view.
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<Json<Vec<QuestionResponse>>, ApiError> {
    let exam_id = parse_object_id(&id, "examId")?;
    let questions = QuestionService::new(state.mongo.clone())
        .list_for_exam(&exam_id)
        .await?;

    let view = if claims.is_teacher() {
        QuestionResponse::for_teacher
    } else {
        QuestionResponse::for_student
    };
    Ok(Json(questions.into_iter().map(view).collect()))
}

/// PUT /api/users/questions/{id}
pub async fn update_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<QuestionRequest>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let question_id = parse_object_id(&id, "question id")?;
    let question = QuestionService::new(state.mongo.clone())
        .update_question(&question_id, req)
        .await?;
    Ok(Json(QuestionResponse::for_teacher(question)))
}

/// DELETE /api/users/questions/{id}
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let question_id = parse_object_id(&id, "question id")?;
    QuestionService::new(state.mongo.clone())
        .delete_question(&question_id)
        .await?;
    Ok(Json(json!({ "message": "Question deleted successfully" })))
}
