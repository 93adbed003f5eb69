use anyhow::{Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection, Database,
};

use super::ServiceError;
use crate::models::coding::{CodingQuestion, CodingSubmission};
use crate::models::exam::{CreateExamRequest, Exam, ExamResponse, UpdateExamRequest};
use crate::models::question::Question;

pub struct ExamService {
    mongo: Database,
}

impl ExamService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn collection(&self) -> Collection<Exam> {
        self.mongo.collection::<Exam>(Exam::COLLECTION)
    }

    pub async fn create_exam(&self, req: CreateExamRequest, created_by: ObjectId) -> Result<ExamResponse> {
        let now = Utc::now();
        let mut exam = Exam {
            id: None,
            exam_name: req.exam_name.trim().to_string(),
            total_questions: req.total_questions,
            duration: req.duration,
            live_date: req.live_date,
            dead_date: req.dead_date,
            created_by,
            created_at: now,
            updated_at: now,
        };

        let inserted = self
            .collection()
            .insert_one(&exam)
            .await
            .context("Failed to insert exam")?;
        exam.id = inserted.inserted_id.as_object_id();

        tracing::info!(exam = %exam.exam_name, "Exam created");
        Ok(ExamResponse::from(exam))
    }

    pub async fn list_exams(&self) -> Result<Vec<ExamResponse>> {
        let exams: Vec<Exam> = self
            .collection()
            .find(doc! {})
            .sort(doc! { "liveDate": -1 })
            .await
            .context("Failed to list exams")?
            .try_collect()
            .await
            .context("Failed to read exams")?;
        Ok(exams.into_iter().map(ExamResponse::from).collect())
    }

    pub async fn find_exam(&self, id: &ObjectId) -> Result<Option<Exam>> {
        self.collection()
            .find_one(doc! { "_id": id })
            .await
            .context("Failed to query exam")
    }

    pub async fn get_exam(&self, id: &ObjectId) -> Result<Exam> {
        self.find_exam(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Exam not found".to_string()).into())
    }

    pub async fn update_exam(&self, id: &ObjectId, req: UpdateExamRequest) -> Result<ExamResponse> {
        let mut exam = self.get_exam(id).await?;

        if let Some(name) = req.exam_name {
            exam.exam_name = name.trim().to_string();
        }
        if let Some(total) = req.total_questions {
            exam.total_questions = total;
        }
        if let Some(duration) = req.duration {
            exam.duration = duration;
        }
        if let Some(live) = req.live_date {
            exam.live_date = live;
        }
        if let Some(dead) = req.dead_date {
            exam.dead_date = dead;
        }
        if exam.live_date >= exam.dead_date {
            return Err(ServiceError::InvalidInput(
                "liveDate must be before deadDate".to_string(),
            )
            .into());
        }
        exam.updated_at = Utc::now();

        self.collection()
            .replace_one(doc! { "_id": id }, &exam)
            .await
            .context("Failed to update exam")?;

        Ok(ExamResponse::from(exam))
    }

    /// Removes the exam together with its questions, coding questions and submissions
    pub async fn delete_exam(&self, id: &ObjectId) -> Result<()> {
        let exam = self.get_exam(id).await?;

        let questions = self
            .mongo
            .collection::<Question>(Question::COLLECTION)
            .delete_many(doc! { "examId": id })
            .await
            .context("Failed to delete exam questions")?;
        let coding = self
            .mongo
            .collection::<CodingQuestion>(CodingQuestion::COLLECTION)
            .delete_many(doc! { "examId": id })
            .await
            .context("Failed to delete coding questions")?;
        let submissions = self
            .mongo
            .collection::<CodingSubmission>(CodingSubmission::COLLECTION)
            .delete_many(doc! { "examId": id })
            .await
            .context("Failed to delete coding submissions")?;

        self.collection()
            .delete_one(doc! { "_id": id })
            .await
            .context("Failed to delete exam")?;

        tracing::info!(
            exam = %exam.exam_name,
            questions = questions.deleted_count,
            coding_questions = coding.deleted_count,
            submissions = submissions.deleted_count,
            "Exam deleted"
        );
        Ok(())
    }
}
