use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono, id_hex};

/// Multiple-choice question stored in MongoDB "questions" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "examId")]
    pub exam_id: ObjectId,
    pub question: String,
    pub options: Vec<QuestionOption>,
    #[serde(default = "default_ansmarks")]
    pub ansmarks: u32,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl Question {
    pub const COLLECTION: &'static str = "questions";

    pub fn correct_option(&self) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.is_correct)
    }
}

pub fn default_ansmarks() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "optionText")]
    pub option_text: String,
    #[serde(rename = "isCorrect", default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OptionInput {
    #[validate(length(min = 1, max = 1000, message = "Option text must be between 1 and 1000 characters"))]
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuestionRequest {
    #[validate(length(min = 1, max = 5000, message = "Question must be between 1 and 5000 characters"))]
    pub question: String,
    #[validate(length(min = 2, max = 10, message = "A question needs between 2 and 10 options"), nested)]
    pub options: Vec<OptionInput>,
    #[validate(range(min = 1, max = 100, message = "ansmarks must be between 1 and 100"))]
    pub ansmarks: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub option_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub exam_id: String,
    pub question: String,
    pub options: Vec<OptionResponse>,
    pub ansmarks: u32,
}

impl QuestionResponse {
    /// Full view including the correct-answer flags
    pub fn for_teacher(question: Question) -> Self {
        Self::build(question, true)
    }

    /// Exam-taking view; `isCorrect` is never sent to students
    pub fn for_student(question: Question) -> Self {
        Self::build(question, false)
    }

    fn build(question: Question, reveal: bool) -> Self {
        Self {
            id: id_hex(&question.id),
            exam_id: question.exam_id.to_hex(),
            question: question.question,
            options: question
                .options
                .into_iter()
                .map(|o| OptionResponse {
                    id: o.id.to_hex(),
                    option_text: o.option_text,
                    is_correct: reveal.then_some(o.is_correct),
                })
                .collect(),
            ansmarks: question.ansmarks,
        }
    }
}
