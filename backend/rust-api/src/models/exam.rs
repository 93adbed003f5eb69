use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{bson_datetime_as_chrono, id_hex};

/// Exam stored in MongoDB "exams" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "examName")]
    pub exam_name: String,
    #[serde(rename = "totalQuestions")]
    pub total_questions: u32,
    /// Minutes
    pub duration: u32,
    #[serde(rename = "liveDate", with = "bson_datetime_as_chrono")]
    pub live_date: DateTime<Utc>,
    #[serde(rename = "deadDate", with = "bson_datetime_as_chrono")]
    pub dead_date: DateTime<Utc>,
    #[serde(rename = "createdBy")]
    pub created_by: ObjectId,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl Exam {
    pub const COLLECTION: &'static str = "exams";

    pub fn status_at(&self, now: DateTime<Utc>) -> ExamStatus {
        if now < self.live_date {
            ExamStatus::Upcoming
        } else if now <= self.dead_date {
            ExamStatus::Live
        } else {
            ExamStatus::Closed
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExamStatus {
    Upcoming,
    Live,
    Closed,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_exam_window"))]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200, message = "Exam name must be between 1 and 200 characters"))]
    pub exam_name: String,
    #[validate(range(max = 500, message = "Total questions must not exceed 500"))]
    pub total_questions: u32,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes"))]
    pub duration: u32,
    pub live_date: DateTime<Utc>,
    pub dead_date: DateTime<Utc>,
}

fn validate_exam_window(req: &CreateExamRequest) -> Result<(), ValidationError> {
    if req.live_date >= req.dead_date {
        let mut err = ValidationError::new("exam_window");
        err.message = Some("liveDate must be before deadDate".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 200, message = "Exam name must be between 1 and 200 characters"))]
    pub exam_name: Option<String>,
    #[validate(range(max = 500, message = "Total questions must not exceed 500"))]
    pub total_questions: Option<u32>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes"))]
    pub duration: Option<u32>,
    pub live_date: Option<DateTime<Utc>>,
    pub dead_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub exam_name: String,
    pub total_questions: u32,
    pub duration: u32,
    pub live_date: DateTime<Utc>,
    pub dead_date: DateTime<Utc>,
    pub created_by: String,
    pub status: ExamStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Exam> for ExamResponse {
    fn from(exam: Exam) -> Self {
        let status = exam.status_at(Utc::now());
        Self {
            id: id_hex(&exam.id),
            exam_name: exam.exam_name,
            total_questions: exam.total_questions,
            duration: exam.duration,
            live_date: exam.live_date,
            dead_date: exam.dead_date,
            created_by: exam.created_by.to_hex(),
            status,
            created_at: exam.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn exam(live: DateTime<Utc>, dead: DateTime<Utc>) -> Exam {
        Exam {
            id: None,
            exam_name: "Network Security".into(),
            total_questions: 10,
            duration: 30,
            live_date: live,
            dead_date: dead,
            created_by: ObjectId::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_exam_status() {
        let now = Utc::now();
        let e = exam(now - Duration::hours(1), now + Duration::hours(1));
        assert_eq!(e.status_at(now), ExamStatus::Live);
        assert_eq!(e.status_at(now - Duration::hours(2)), ExamStatus::Upcoming);
        assert_eq!(e.status_at(now + Duration::hours(2)), ExamStatus::Closed);
    }

    #[test]
    fn test_create_request_rejects_inverted_window() {
        let req: CreateExamRequest = serde_json::from_value(serde_json::json!({
            "examName": "Quiz",
            "totalQuestions": 5,
            "duration": 20,
            "liveDate": "2025-05-02T10:00:00Z",
            "deadDate": "2025-05-01T10:00:00Z"
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_request_accepts_valid_exam() {
        let req: CreateExamRequest = serde_json::from_value(serde_json::json!({
            "examName": "Quiz",
            "totalQuestions": 5,
            "duration": 20,
            "liveDate": "2025-05-01T10:00:00Z",
            "deadDate": "2025-05-02T10:00:00Z"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
    }
}
