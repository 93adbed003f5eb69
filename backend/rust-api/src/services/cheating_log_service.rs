use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Bson, Document},
    options::ReturnDocument,
    Collection, Database,
};

use super::exam_service::ExamService;
use super::user_service::UserService;
use crate::metrics::CHEATING_VIOLATIONS_TOTAL;
use crate::models::cheating_log::{
    CheatingLog, CheatingLogView, SaveCheatingLogRequest, ViolationCounts, MAX_STORED_SCREENSHOTS,
};

/// Known screenshot kinds keep the metric label set bounded
fn violation_label(kind: &str) -> &'static str {
    match kind {
        "noFace" => "noFace",
        "multipleFace" => "multipleFace",
        "cellPhone" => "cellPhone",
        "prohibitedObject" => "prohibitedObject",
        _ => "other",
    }
}

/// Upsert document for one report: counters overwritten, screenshots appended
/// and trimmed to the newest `MAX_STORED_SCREENSHOTS`
fn log_update(
    username: &str,
    email: &str,
    counts: &ViolationCounts,
    screenshots: Bson,
    now: DateTime<Utc>,
) -> Document {
    let bson_now = bson::DateTime::from_millis(now.timestamp_millis());
    let keep_newest = -MAX_STORED_SCREENSHOTS;
    doc! {
        "$set": {
            "username": username,
            "email": email,
            "noFaceCount": i64::from(counts.no_face_count),
            "multipleFaceCount": i64::from(counts.multiple_face_count),
            "cellPhoneCount": i64::from(counts.cell_phone_count),
            "prohibitedObjectCount": i64::from(counts.prohibited_object_count),
            "updatedAt": bson_now,
        },
        "$push": {
            "screenshots": {
                "$each": screenshots,
                "$slice": keep_newest,
            }
        },
        "$setOnInsert": { "createdAt": bson_now },
    }
}

pub struct CheatingLogService {
    mongo: Database,
}

impl CheatingLogService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn collection(&self) -> Collection<CheatingLog> {
        self.mongo.collection::<CheatingLog>(CheatingLog::COLLECTION)
    }

    /// Records the latest counters for (user, exam) and appends new screenshots.
    ///
    /// The client reports running totals, so counters overwrite the stored
    /// values while screenshots accumulate.
    pub async fn save_log(
        &self,
        user_id: ObjectId,
        exam_id: ObjectId,
        req: SaveCheatingLogRequest,
    ) -> Result<CheatingLogView> {
        ExamService::new(self.mongo.clone()).get_exam(&exam_id).await?;
        let user = UserService::new(self.mongo.clone()).get_user(&user_id).await?;

        let now = Utc::now();
        let screenshots: Vec<_> = req
            .screenshots
            .into_iter()
            .map(|s| s.into_screenshot(now))
            .collect();
        for shot in &screenshots {
            CHEATING_VIOLATIONS_TOTAL
                .with_label_values(&[violation_label(&shot.kind)])
                .inc();
        }
        let screenshot_docs = bson::to_bson(&screenshots).context("Failed to encode screenshots")?;
        let update = log_update(&user.name, &user.email, &req.counts, screenshot_docs, now);

        let log = self
            .collection()
            .find_one_and_update(doc! { "userId": user_id, "examId": exam_id }, update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to save cheating log")?
            .ok_or_else(|| anyhow::anyhow!("Upserted cheating log was not returned"))?;

        tracing::info!(
            exam_id = %exam_id.to_hex(),
            user_id = %user_id.to_hex(),
            total = log.counts().total(),
            screenshots = log.screenshots.len(),
            "Cheating log recorded"
        );
        Ok(CheatingLogView::from(log))
    }

    /// Logs of one exam, most violations first
    pub async fn logs_for_exam(&self, exam_id: &ObjectId) -> Result<Vec<CheatingLogView>> {
        let logs: Vec<CheatingLog> = self
            .collection()
            .find(doc! { "examId": exam_id })
            .sort(doc! { "updatedAt": -1 })
            .await
            .context("Failed to list cheating logs")?
            .try_collect()
            .await
            .context("Failed to read cheating logs")?;

        let mut views: Vec<CheatingLogView> = logs.into_iter().map(CheatingLogView::from).collect();
        views.sort_by(|a, b| b.total_violations.cmp(&a.total_violations));
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_label_is_bounded() {
        assert_eq!(violation_label("cellPhone"), "cellPhone");
        assert_eq!(violation_label("noFace"), "noFace");
        assert_eq!(violation_label("<script>"), "other");
    }

    #[test]
    fn test_update_keeps_only_newest_screenshots() {
        let counts = ViolationCounts {
            no_face_count: 2,
            multiple_face_count: 0,
            cell_phone_count: 1,
            prohibited_object_count: 0,
        };
        let update = log_update("Ali", "ali@example.com", &counts, Bson::Array(vec![]), Utc::now());

        let push = update.get_document("$push").unwrap();
        let screenshots = push.get_document("screenshots").unwrap();
        assert_eq!(screenshots.get_i32("$slice").unwrap(), -MAX_STORED_SCREENSHOTS);
        assert!(screenshots.get_array("$each").unwrap().is_empty());

        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_i64("noFaceCount").unwrap(), 2);
        assert_eq!(set.get_i64("cellPhoneCount").unwrap(), 1);
        assert_eq!(set.get_str("email").unwrap(), "ali@example.com");
    }
}
