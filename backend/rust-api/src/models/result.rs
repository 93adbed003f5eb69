use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use super::coding::CodingSubmissionView;
use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option, id_hex};

/// Exam attempt stored in MongoDB "results" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamResult {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "examId")]
    pub exam_id: ObjectId,
    #[serde(rename = "userId")]
    pub user_id: ObjectId,
    /// questionId (hex) -> chosen optionId (hex)
    #[serde(default)]
    pub answers: HashMap<String, String>,
    #[serde(rename = "totalMarks")]
    pub total_marks: u32,
    pub percentage: f64,
    #[serde(rename = "showToStudent", default = "default_visible")]
    pub show_to_student: bool,
    #[serde(rename = "codingMarks", default, skip_serializing_if = "Option::is_none")]
    pub coding_marks: Option<f64>,
    #[serde(rename = "totalScore", default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(rename = "gradedBy", default, skip_serializing_if = "Option::is_none")]
    pub graded_by: Option<ObjectId>,
    #[serde(
        rename = "gradedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub graded_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl ExamResult {
    pub const COLLECTION: &'static str = "results";
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SaveResultRequest {
    pub exam_id: Option<String>,
    pub answers: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize, Validate, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResultRequest {
    #[validate(range(max = 100000, message = "totalMarks is out of range"))]
    pub total_marks: Option<u32>,
    #[validate(range(min = 0.0, max = 100.0, message = "percentage must be between 0 and 100"))]
    pub percentage: Option<f64>,
    #[validate(range(min = 0.0, message = "codingMarks must not be negative"))]
    pub coding_marks: Option<f64>,
    #[validate(range(min = 0.0, message = "totalScore must not be negative"))]
    pub total_score: Option<f64>,
    #[validate(length(max = 5000, message = "Feedback must not exceed 5000 characters"))]
    pub feedback: Option<String>,
    pub show_to_student: Option<bool>,
}

/// Student reference joined onto teacher listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    #[serde(rename = "_id")]
    pub id: String,
    pub exam_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_name: Option<String>,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ResultUser>,
    pub answers: HashMap<String, String>,
    pub total_marks: u32,
    pub percentage: f64,
    pub show_to_student: bool,
    pub coding_marks: Option<f64>,
    pub total_score: Option<f64>,
    pub feedback: Option<String>,
    pub graded_by: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub coding_submissions: Vec<CodingSubmissionView>,
}

impl From<ExamResult> for ResultView {
    fn from(result: ExamResult) -> Self {
        Self {
            id: id_hex(&result.id),
            exam_id: result.exam_id.to_hex(),
            exam_name: None,
            user_id: result.user_id.to_hex(),
            user: None,
            answers: result.answers,
            total_marks: result.total_marks,
            percentage: result.percentage,
            show_to_student: result.show_to_student,
            coding_marks: result.coding_marks,
            total_score: result.total_score,
            feedback: result.feedback,
            graded_by: result.graded_by.map(|id| id.to_hex()),
            graded_at: result.graded_at,
            created_at: result.created_at,
            updated_at: result.updated_at,
            coding_submissions: Vec::new(),
        }
    }
}

impl ResultView {
    pub fn with_user(mut self, user: Option<ResultUser>) -> Self {
        self.user = user;
        self
    }

    pub fn with_exam_name(mut self, name: impl Into<String>) -> Self {
        self.exam_name = Some(name.into());
        self
    }

    pub fn with_submissions(mut self, submissions: Vec<CodingSubmissionView>) -> Self {
        self.coding_submissions = submissions;
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityToggled {
    #[serde(rename = "_id")]
    pub id: String,
    pub show_to_student: bool,
    pub message: String,
}

impl VisibilityToggled {
    pub fn new(id: String, show_to_student: bool) -> Self {
        let state = if show_to_student { "enabled" } else { "disabled" };
        Self {
            id,
            show_to_student,
            message: format!("Result visibility {} successfully", state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{self, doc};

    #[test]
    fn test_visibility_defaults_to_true_for_old_documents() {
        let doc = doc! {
            "_id": ObjectId::new(),
            "examId": ObjectId::new(),
            "userId": ObjectId::new(),
            "answers": { "q1": "o1" },
            "totalMarks": 3,
            "percentage": 75.0,
            "createdAt": bson::DateTime::now(),
            "updatedAt": bson::DateTime::now(),
        };
        let result: ExamResult = bson::from_document(doc).unwrap();
        assert!(result.show_to_student);
        assert_eq!(result.answers.get("q1").map(String::as_str), Some("o1"));
        assert!(result.graded_at.is_none());
    }

    #[test]
    fn test_toggle_message() {
        assert_eq!(
            VisibilityToggled::new("abc".into(), true).message,
            "Result visibility enabled successfully"
        );
        assert_eq!(
            VisibilityToggled::new("abc".into(), false).message,
            "Result visibility disabled successfully"
        );
    }

    #[test]
    fn test_update_request_rejects_percentage_over_100() {
        let req = UpdateResultRequest {
            percentage: Some(120.0),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
