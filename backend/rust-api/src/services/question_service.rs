use anyhow::{Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection, Database,
};

use super::exam_service::ExamService;
use super::ServiceError;
use crate::models::question::{
    default_ansmarks, OptionInput, Question, QuestionOption, QuestionRequest,
};

/// Options get fresh ids; exactly one must be flagged correct
pub fn build_options(inputs: Vec<OptionInput>) -> Result<Vec<QuestionOption>, ServiceError> {
    let correct = inputs.iter().filter(|o| o.is_correct).count();
    if correct != 1 {
        return Err(ServiceError::InvalidInput(
            "Exactly one option must be marked as correct".to_string(),
        ));
    }

    Ok(inputs
        .into_iter()
        .map(|o| QuestionOption {
            id: ObjectId::new(),
            option_text: o.option_text.trim().to_string(),
            is_correct: o.is_correct,
        })
        .collect())
}

pub struct QuestionService {
    mongo: Database,
}

impl QuestionService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn collection(&self) -> Collection<Question> {
        self.mongo.collection::<Question>(Question::COLLECTION)
    }

    pub async fn create_question(&self, exam_id: &ObjectId, req: QuestionRequest) -> Result<Question> {
        ExamService::new(self.mongo.clone()).get_exam(exam_id).await?;

        let now = Utc::now();
        let mut question = Question {
            id: None,
            exam_id: *exam_id,
            question: req.question.trim().to_string(),
            options: build_options(req.options)?,
            ansmarks: req.ansmarks.unwrap_or_else(default_ansmarks),
            created_at: now,
            updated_at: now,
        };

        let inserted = self
            .collection()
            .insert_one(&question)
            .await
            .context("Failed to insert question")?;
        question.id = inserted.inserted_id.as_object_id();

        tracing::debug!(exam_id = %exam_id.to_hex(), "Question created");
        Ok(question)
    }

    pub async fn list_for_exam(&self, exam_id: &ObjectId) -> Result<Vec<Question>> {
        self.collection()
            .find(doc! { "examId": exam_id })
            .sort(doc! { "createdAt": 1 })
            .await
            .context("Failed to list questions")?
            .try_collect()
            .await
            .context("Failed to read questions")
    }

    pub async fn update_question(&self, id: &ObjectId, req: QuestionRequest) -> Result<Question> {
        let mut question = self
            .collection()
            .find_one(doc! { "_id": id })
            .await
            .context("Failed to query question")?
            .ok_or_else(|| ServiceError::NotFound("Question not found".to_string()))?;

        question.question = req.question.trim().to_string();
        question.options = build_options(req.options)?;
        if let Some(marks) = req.ansmarks {
            question.ansmarks = marks;
        }
        question.updated_at = Utc::now();

        self.collection()
            .replace_one(doc! { "_id": id }, &question)
            .await
            .context("Failed to update question")?;

        Ok(question)
    }

    pub async fn delete_question(&self, id: &ObjectId) -> Result<()> {
        let result = self
            .collection()
            .delete_one(doc! { "_id": id })
            .await
            .context("Failed to delete question")?;

        if result.deleted_count == 0 {
            return Err(ServiceError::NotFound("Question not found".to_string()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(text: &str, correct: bool) -> OptionInput {
        OptionInput {
            option_text: text.to_string(),
            is_correct: correct,
        }
    }

    #[test]
    fn test_build_options_assigns_ids() {
        let options = build_options(vec![option(" TCP ", true), option("UDP", false)]).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].option_text, "TCP");
        assert_ne!(options[0].id, options[1].id);
    }

    #[test]
    fn test_build_options_requires_single_correct() {
        assert!(build_options(vec![option("a", false), option("b", false)]).is_err());
        assert!(build_options(vec![option("a", true), option("b", true)]).is_err());
    }
}
