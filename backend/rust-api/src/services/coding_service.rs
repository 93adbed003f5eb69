use anyhow::{Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    options::ReturnDocument,
    Collection, Database,
};
use std::collections::HashMap;

use super::exam_service::ExamService;
use super::ServiceError;
use crate::models::coding::{
    CodingQuestion, CodingQuestionRequest, CodingSubmission, CodingSubmissionView,
    SubmitCodeRequest, DEFAULT_SUBMISSION_STATUS, MAX_EXECUTION_TIME_MS,
};

/// Int64 value for `executionTime`; values past one hour are invalid input
fn execution_time_value(ms: Option<u64>) -> Result<Bson, ServiceError> {
    match ms {
        None => Ok(Bson::Null),
        Some(ms) if ms <= MAX_EXECUTION_TIME_MS => i64::try_from(ms)
            .map(Bson::Int64)
            .map_err(|_| ServiceError::InvalidInput("executionTime is out of range".to_string())),
        Some(_) => Err(ServiceError::InvalidInput(
            "executionTime must not exceed one hour".to_string(),
        )),
    }
}

pub struct CodingService {
    mongo: Database,
}

impl CodingService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn questions(&self) -> Collection<CodingQuestion> {
        self.mongo.collection::<CodingQuestion>(CodingQuestion::COLLECTION)
    }

    fn submissions(&self) -> Collection<CodingSubmission> {
        self.mongo
            .collection::<CodingSubmission>(CodingSubmission::COLLECTION)
    }

    pub async fn create_question(
        &self,
        exam_id: ObjectId,
        req: CodingQuestionRequest,
        created_by: ObjectId,
    ) -> Result<CodingQuestion> {
        ExamService::new(self.mongo.clone()).get_exam(&exam_id).await?;

        let mut question = CodingQuestion {
            id: None,
            exam_id,
            question: req.question.trim().to_string(),
            description: req.description,
            created_by,
            created_at: Utc::now(),
        };
        let inserted = self
            .questions()
            .insert_one(&question)
            .await
            .context("Failed to insert coding question")?;
        question.id = inserted.inserted_id.as_object_id();
        Ok(question)
    }

    pub async fn list_questions(&self, exam_id: &ObjectId) -> Result<Vec<CodingQuestion>> {
        self.find_questions(doc! { "examId": exam_id }).await
    }

    async fn find_questions(&self, filter: Document) -> Result<Vec<CodingQuestion>> {
        self.questions()
            .find(filter)
            .sort(doc! { "createdAt": 1 })
            .await
            .context("Failed to list coding questions")?
            .try_collect()
            .await
            .context("Failed to read coding questions")
    }

    /// One submission per (question, student); resubmitting replaces code and status
    pub async fn submit(&self, user_id: ObjectId, req: SubmitCodeRequest) -> Result<CodingSubmission> {
        let question_id = ObjectId::parse_str(&req.question_id).map_err(|_| {
            ServiceError::InvalidInput("Invalid questionId: must be ObjectId".to_string())
        })?;
        let question = self
            .questions()
            .find_one(doc! { "_id": question_id })
            .await
            .context("Failed to query coding question")?
            .ok_or_else(|| ServiceError::NotFound("Coding question not found".to_string()))?;

        let status = req
            .status
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUBMISSION_STATUS.to_string());

        let mut set = doc! {
            "examId": question.exam_id,
            "code": &req.code,
            "language": req.language.as_str(),
            "status": status,
            "submittedAt": mongodb::bson::DateTime::now(),
        };
        set.insert("executionTime", execution_time_value(req.execution_time)?);

        let submission = self
            .submissions()
            .find_one_and_update(
                doc! { "questionId": question_id, "userId": user_id },
                doc! { "$set": set },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to save coding submission")?
            .ok_or_else(|| anyhow::anyhow!("Upserted submission was not returned"))?;

        tracing::info!(
            question_id = %question_id.to_hex(),
            user_id = %user_id.to_hex(),
            language = submission.language.as_str(),
            "Coding submission saved"
        );
        Ok(submission)
    }

    /// Student's submissions for one exam, labelled with their question text
    pub async fn submissions_for(
        &self,
        exam_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Vec<CodingSubmissionView>> {
        let mut by_user = self
            .submissions_by_user(doc! { "examId": exam_id, "userId": user_id })
            .await?;
        Ok(by_user.remove(user_id).unwrap_or_default())
    }

    /// Submissions matching `filter`, grouped by student
    pub async fn submissions_by_user(
        &self,
        filter: Document,
    ) -> Result<HashMap<ObjectId, Vec<CodingSubmissionView>>> {
        let submissions: Vec<CodingSubmission> = self
            .submissions()
            .find(filter)
            .sort(doc! { "submittedAt": 1 })
            .await
            .context("Failed to list coding submissions")?
            .try_collect()
            .await
            .context("Failed to read coding submissions")?;

        if submissions.is_empty() {
            return Ok(HashMap::new());
        }

        let question_ids: Vec<ObjectId> = submissions.iter().map(|s| s.question_id).collect();
        let questions: HashMap<ObjectId, CodingQuestion> = self
            .find_questions(doc! { "_id": { "$in": question_ids } })
            .await?
            .into_iter()
            .filter_map(|q| q.id.map(|id| (id, q)))
            .collect();

        let mut grouped: HashMap<ObjectId, Vec<CodingSubmissionView>> = HashMap::new();
        for submission in submissions {
            let user_id = submission.user_id;
            let question = questions.get(&submission.question_id);
            grouped
                .entry(user_id)
                .or_default()
                .push(CodingSubmissionView::new(submission, question));
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;

    fn stored_submission(execution_time: Bson) -> Document {
        doc! {
            "_id": ObjectId::new(),
            "questionId": ObjectId::new(),
            "examId": ObjectId::new(),
            "userId": ObjectId::new(),
            "code": "print(1)",
            "language": "python",
            "status": DEFAULT_SUBMISSION_STATUS,
            "executionTime": execution_time,
            "submittedAt": bson::DateTime::now(),
        }
    }

    #[test]
    fn test_execution_time_is_stored_as_readable_int64() {
        let value = execution_time_value(Some(1500)).unwrap();
        assert_eq!(value, Bson::Int64(1500));

        let submission: CodingSubmission =
            bson::from_document(stored_submission(value)).unwrap();
        assert_eq!(submission.execution_time, Some(1500));
    }

    #[test]
    fn test_missing_execution_time_reads_back_as_none() {
        let value = execution_time_value(None).unwrap();
        let submission: CodingSubmission =
            bson::from_document(stored_submission(value)).unwrap();
        assert_eq!(submission.execution_time, None);
    }

    #[test]
    fn test_oversized_execution_time_is_rejected() {
        for ms in [MAX_EXECUTION_TIME_MS + 1, i64::MAX as u64 + 1, u64::MAX] {
            assert!(matches!(
                execution_time_value(Some(ms)),
                Err(ServiceError::InvalidInput(_))
            ));
        }
    }
}
