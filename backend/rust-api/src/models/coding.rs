use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono, id_hex};

/// Coding prompt attached to an exam ("coding_questions" collection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodingQuestion {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "examId")]
    pub exam_id: ObjectId,
    pub question: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "createdBy")]
    pub created_by: ObjectId,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl CodingQuestion {
    pub const COLLECTION: &'static str = "coding_questions";
}

/// One student's answer to a coding question; unique per (questionId, userId)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodingSubmission {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "questionId")]
    pub question_id: ObjectId,
    #[serde(rename = "examId")]
    pub exam_id: ObjectId,
    #[serde(rename = "userId")]
    pub user_id: ObjectId,
    pub code: String,
    pub language: Language,
    pub status: String,
    /// Milliseconds reported by the client runner
    #[serde(rename = "executionTime", default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    #[serde(rename = "submittedAt", with = "bson_datetime_as_chrono")]
    pub submitted_at: DateTime<Utc>,
}

impl CodingSubmission {
    pub const COLLECTION: &'static str = "coding_submissions";
}

pub const DEFAULT_SUBMISSION_STATUS: &str = "Submitted";

/// Longest run time a client may report, one hour in ms
pub const MAX_EXECUTION_TIME_MS: u64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Java,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Java => "java",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::Javascript),
            "java" => Ok(Language::Java),
            other => Err(format!("Unsupported language: {}", other)),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CodingQuestionRequest {
    pub exam_id: String,
    #[validate(length(min = 1, max = 5000, message = "Question must be between 1 and 5000 characters"))]
    pub question: String,
    #[serde(default)]
    #[validate(length(max = 20000, message = "Description must not exceed 20000 characters"))]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodingQuestionResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub exam_id: String,
    pub question: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<CodingQuestion> for CodingQuestionResponse {
    fn from(q: CodingQuestion) -> Self {
        Self {
            id: id_hex(&q.id),
            exam_id: q.exam_id.to_hex(),
            question: q.question,
            description: q.description,
            created_at: q.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCodeRequest {
    pub question_id: String,
    #[validate(length(min = 1, max = 100000, message = "Code must be between 1 and 100000 characters"))]
    pub code: String,
    pub language: Language,
    #[validate(length(max = 32, message = "Status must not exceed 32 characters"))]
    pub status: Option<String>,
    #[validate(range(max = MAX_EXECUTION_TIME_MS, message = "executionTime must not exceed one hour"))]
    pub execution_time: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RunCodeRequest {
    #[validate(length(min = 1, max = 100000, message = "Code must be between 1 and 100000 characters"))]
    pub code: String,
}

/// Submission as embedded in result listings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodingSubmissionView {
    #[serde(rename = "_id")]
    pub id: String,
    pub question_id: String,
    pub question: String,
    pub code: String,
    pub language: String,
    pub status: String,
    pub execution_time: u64,
    pub submitted_at: DateTime<Utc>,
}

impl CodingSubmissionView {
    pub fn new(submission: CodingSubmission, question: Option<&CodingQuestion>) -> Self {
        let code = if submission.code.trim().is_empty() {
            "No code submitted".to_string()
        } else {
            submission.code
        };
        Self {
            id: id_hex(&submission.id),
            question_id: submission.question_id.to_hex(),
            question: question
                .map(|q| q.question.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            code,
            language: submission.language.as_str().to_string(),
            status: submission.status,
            execution_time: submission.execution_time.unwrap_or(0),
            submitted_at: submission.submitted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing() {
        assert_eq!("JS".parse::<Language>().unwrap(), Language::Javascript);
        assert_eq!("python".parse::<Language>().unwrap(), Language::Python);
        assert!("ruby".parse::<Language>().is_err());
    }

    fn submit_request(status: Option<&str>, execution_time: Option<u64>) -> SubmitCodeRequest {
        SubmitCodeRequest {
            question_id: ObjectId::new().to_hex(),
            code: "print(1)".into(),
            language: Language::Python,
            status: status.map(str::to_string),
            execution_time,
        }
    }

    #[test]
    fn test_submit_request_bounds_execution_time() {
        assert!(submit_request(None, None).validate().is_ok());
        assert!(submit_request(None, Some(MAX_EXECUTION_TIME_MS)).validate().is_ok());

        let errors = submit_request(None, Some(u64::MAX)).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("execution_time"));
        assert!(submit_request(None, Some(i64::MAX as u64 + 1)).validate().is_err());
    }

    #[test]
    fn test_submit_request_bounds_status_length() {
        assert!(submit_request(Some("Accepted"), None).validate().is_ok());
        let errors = submit_request(Some(&"x".repeat(33)), None).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("status"));
    }

    #[test]
    fn test_blank_code_is_reported_as_missing() {
        let submission = CodingSubmission {
            id: None,
            question_id: ObjectId::new(),
            exam_id: ObjectId::new(),
            user_id: ObjectId::new(),
            code: "   ".into(),
            language: Language::Java,
            status: DEFAULT_SUBMISSION_STATUS.into(),
            execution_time: None,
            submitted_at: Utc::now(),
        };
        let view = CodingSubmissionView::new(submission, None);
        assert_eq!(view.code, "No code submitted");
        assert_eq!(view.execution_time, 0);
        assert_eq!(view.status, "Submitted");
    }

    #[test]
    fn test_view_without_question_is_unknown() {
        let submission = CodingSubmission {
            id: Some(ObjectId::new()),
            question_id: ObjectId::new(),
            exam_id: ObjectId::new(),
            user_id: ObjectId::new(),
            code: "print(1)".into(),
            language: Language::Python,
            status: DEFAULT_SUBMISSION_STATUS.into(),
            execution_time: Some(12),
            submitted_at: Utc::now(),
        };
        let view = CodingSubmissionView::new(submission, None);
        assert_eq!(view.question, "Unknown");
        assert_eq!(view.language, "python");
        assert_eq!(view.execution_time, 12);
    }
}
