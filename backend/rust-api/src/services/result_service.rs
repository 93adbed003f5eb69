use anyhow::{Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::ReturnDocument,
    Collection, Database,
};
use std::collections::HashMap;

use super::coding_service::CodingService;
use super::question_service::QuestionService;
use super::scoring::score_answers;
use super::ServiceError;
use crate::metrics::RESULTS_SUBMITTED_TOTAL;
use crate::middlewares::auth::JwtClaims;
use crate::models::exam::Exam;
use crate::models::result::{
    ExamResult, ResultUser, ResultView, UpdateResultRequest, VisibilityToggled,
};
use crate::models::user::User;

pub const UNKNOWN_EXAM: &str = "Unknown Exam";

pub struct ResultService {
    mongo: Database,
}

impl ResultService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn collection(&self) -> Collection<ExamResult> {
        self.mongo.collection::<ExamResult>(ExamResult::COLLECTION)
    }

    /// Scores the answers against the exam's MCQs and stores a visible result
    pub async fn save_result(
        &self,
        user_id: ObjectId,
        exam_id: ObjectId,
        answers: HashMap<String, String>,
    ) -> Result<ResultView> {
        let questions = QuestionService::new(self.mongo.clone())
            .list_for_exam(&exam_id)
            .await?;
        let score = score_answers(&questions, &answers);

        let now = Utc::now();
        let mut result = ExamResult {
            id: None,
            exam_id,
            user_id,
            answers,
            total_marks: score.total_marks,
            percentage: score.percentage,
            show_to_student: true,
            coding_marks: None,
            total_score: None,
            feedback: None,
            graded_by: None,
            graded_at: None,
            created_at: now,
            updated_at: now,
        };

        let inserted = self
            .collection()
            .insert_one(&result)
            .await
            .context("Failed to insert result")?;
        result.id = inserted.inserted_id.as_object_id();

        RESULTS_SUBMITTED_TOTAL.inc();
        tracing::info!(
            exam_id = %exam_id.to_hex(),
            user_id = %user_id.to_hex(),
            total_marks = score.total_marks,
            correct = score.correct_answers,
            questions = score.total_questions,
            "Result saved"
        );

        Ok(ResultView::from(result))
    }

    async fn find_results(&self, filter: Document) -> Result<Vec<ExamResult>> {
        self.collection()
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .await
            .context("Failed to list results")?
            .try_collect()
            .await
            .context("Failed to read results")
    }

    async fn load_users(&self, ids: Vec<ObjectId>) -> Result<HashMap<ObjectId, ResultUser>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let users: Vec<User> = self
            .mongo
            .collection::<User>(User::COLLECTION)
            .find(doc! { "_id": { "$in": ids } })
            .await
            .context("Failed to load result users")?
            .try_collect()
            .await
            .context("Failed to read result users")?;

        Ok(users
            .into_iter()
            .filter_map(|u| {
                u.id.map(|id| {
                    (
                        id,
                        ResultUser {
                            id: id.to_hex(),
                            name: u.name,
                            email: u.email,
                        },
                    )
                })
            })
            .collect())
    }

    async fn exam_names(&self) -> Result<HashMap<ObjectId, String>> {
        let exams: Vec<Exam> = self
            .mongo
            .collection::<Exam>(Exam::COLLECTION)
            .find(doc! {})
            .await
            .context("Failed to list exams")?
            .try_collect()
            .await
            .context("Failed to read exams")?;
        Ok(exams
            .into_iter()
            .filter_map(|e| e.id.map(|id| (id, e.exam_name)))
            .collect())
    }

    /// Teacher view of one exam: student and coding submissions joined in
    pub async fn results_for_exam(&self, exam_id: &ObjectId) -> Result<Vec<ResultView>> {
        let results = self.find_results(doc! { "examId": exam_id }).await?;
        let users = self
            .load_users(results.iter().map(|r| r.user_id).collect())
            .await?;
        let submissions = CodingService::new(self.mongo.clone())
            .submissions_by_user(doc! { "examId": exam_id })
            .await?;

        Ok(results
            .into_iter()
            .map(|r| {
                let user = users.get(&r.user_id).cloned();
                let coding = submissions.get(&r.user_id).cloned().unwrap_or_default();
                ResultView::from(r).with_user(user).with_submissions(coding)
            })
            .collect())
    }

    /// Every result the student owns; `showToStudent` is reported, not filtered on
    pub async fn results_for_student(&self, user_id: &ObjectId) -> Result<Vec<ResultView>> {
        let results = self.find_results(doc! { "userId": user_id }).await?;
        let names = self.exam_names().await?;
        let coding = CodingService::new(self.mongo.clone());

        let mut views = Vec::with_capacity(results.len());
        for result in results {
            let submissions = coding.submissions_for(&result.exam_id, user_id).await?;
            let name = names
                .get(&result.exam_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_EXAM.to_string());
            views.push(
                ResultView::from(result)
                    .with_exam_name(name)
                    .with_submissions(submissions),
            );
        }
        Ok(views)
    }

    /// Every result with exam name, student and coding submissions
    pub async fn all_results(&self) -> Result<Vec<ResultView>> {
        let results = self.find_results(doc! {}).await?;
        let names = self.exam_names().await?;
        let users = self
            .load_users(results.iter().map(|r| r.user_id).collect())
            .await?;
        let coding = CodingService::new(self.mongo.clone());

        let mut views = Vec::with_capacity(results.len());
        for result in results {
            let submissions = coding
                .submissions_for(&result.exam_id, &result.user_id)
                .await?;
            let name = names
                .get(&result.exam_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_EXAM.to_string());
            let user = users.get(&result.user_id).cloned();
            views.push(
                ResultView::from(result)
                    .with_exam_name(name)
                    .with_user(user)
                    .with_submissions(submissions),
            );
        }
        Ok(views)
    }

    async fn get_raw(&self, id: &ObjectId) -> Result<ExamResult> {
        self.collection()
            .find_one(doc! { "_id": id })
            .await
            .context("Failed to query result")?
            .ok_or_else(|| ServiceError::NotFound("Result not found".to_string()).into())
    }

    /// Teachers see any result, students only their own
    pub async fn get_result(&self, id: &ObjectId, claims: &JwtClaims) -> Result<ResultView> {
        let result = self.get_raw(id).await?;
        if !claims.is_teacher() && result.user_id.to_hex() != claims.sub {
            return Err(
                ServiceError::Forbidden("Not authorized to view this result".to_string()).into(),
            );
        }

        let users = self.load_users(vec![result.user_id]).await?;
        let submissions = CodingService::new(self.mongo.clone())
            .submissions_for(&result.exam_id, &result.user_id)
            .await?;
        let user = users.get(&result.user_id).cloned();

        Ok(ResultView::from(result)
            .with_user(user)
            .with_submissions(submissions))
    }

    pub async fn update_result(
        &self,
        id: &ObjectId,
        req: UpdateResultRequest,
        graded_by: ObjectId,
    ) -> Result<ResultView> {
        let now = mongodb::bson::DateTime::now();
        let mut set = doc! {
            "gradedBy": graded_by,
            "gradedAt": now,
            "updatedAt": now,
        };
        if let Some(total_marks) = req.total_marks {
            set.insert("totalMarks", i64::from(total_marks));
        }
        if let Some(percentage) = req.percentage {
            set.insert("percentage", percentage);
        }
        if let Some(coding_marks) = req.coding_marks {
            set.insert("codingMarks", coding_marks);
        }
        if let Some(total_score) = req.total_score {
            set.insert("totalScore", total_score);
        }
        if let Some(feedback) = req.feedback {
            set.insert("feedback", feedback);
        }
        if let Some(show) = req.show_to_student {
            set.insert("showToStudent", show);
        }

        let updated = self
            .collection()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update result")?
            .ok_or_else(|| ServiceError::NotFound("Result not found".to_string()))?;

        tracing::info!(result_id = %id.to_hex(), graded_by = %graded_by.to_hex(), "Result graded");
        Ok(ResultView::from(updated))
    }

    pub async fn toggle_visibility(&self, id: &ObjectId) -> Result<VisibilityToggled> {
        // pipeline update flips the flag atomically
        let pipeline = vec![doc! {
            "$set": {
                "showToStudent": { "$not": [ { "$ifNull": ["$showToStudent", true] } ] },
                "updatedAt": "$$NOW",
            }
        }];

        let updated = self
            .collection()
            .find_one_and_update(doc! { "_id": id }, pipeline)
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to toggle result visibility")?
            .ok_or_else(|| ServiceError::NotFound("Result not found".to_string()))?;

        tracing::info!(
            result_id = %id.to_hex(),
            visible = updated.show_to_student,
            "Result visibility toggled"
        );
        Ok(VisibilityToggled::new(id.to_hex(), updated.show_to_student))
    }

    pub async fn delete_result(&self, id: &ObjectId) -> Result<()> {
        let deleted = self
            .collection()
            .delete_one(doc! { "_id": id })
            .await
            .context("Failed to delete result")?;
        if deleted.deleted_count == 0 {
            return Err(ServiceError::NotFound("Result not found".to_string()).into());
        }
        Ok(())
    }
}
