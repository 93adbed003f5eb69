use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono, id_hex};

/// Proctoring counters for one student in one exam ("cheating_logs" collection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheatingLog {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "examId")]
    pub exam_id: ObjectId,
    #[serde(rename = "userId")]
    pub user_id: ObjectId,
    pub username: String,
    pub email: String,
    #[serde(rename = "noFaceCount", default)]
    pub no_face_count: u32,
    #[serde(rename = "multipleFaceCount", default)]
    pub multiple_face_count: u32,
    #[serde(rename = "cellPhoneCount", default)]
    pub cell_phone_count: u32,
    #[serde(rename = "prohibitedObjectCount", default)]
    pub prohibited_object_count: u32,
    #[serde(default)]
    pub screenshots: Vec<Screenshot>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl CheatingLog {
    pub const COLLECTION: &'static str = "cheating_logs";

    pub fn counts(&self) -> ViolationCounts {
        ViolationCounts {
            no_face_count: self.no_face_count,
            multiple_face_count: self.multiple_face_count,
            cell_phone_count: self.cell_phone_count,
            prohibited_object_count: self.prohibited_object_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ViolationCounts {
    #[serde(default)]
    pub no_face_count: u32,
    #[serde(default)]
    pub multiple_face_count: u32,
    #[serde(default)]
    pub cell_phone_count: u32,
    #[serde(default)]
    pub prohibited_object_count: u32,
}

impl ViolationCounts {
    pub fn total(&self) -> u32 {
        self.no_face_count
            .saturating_add(self.multiple_face_count)
            .saturating_add(self.cell_phone_count)
            .saturating_add(self.prohibited_object_count)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_total(total: u32) -> Self {
        match total {
            0 => Severity::None,
            1..=2 => Severity::Low,
            3..=5 => Severity::Medium,
            _ => Severity::High,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screenshot {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "detectedAt", with = "bson_datetime_as_chrono")]
    pub detected_at: DateTime<Utc>,
}

/// Largest accepted screenshot url (data urls included)
pub const MAX_SCREENSHOT_URL_BYTES: u64 = 256 * 1024;
/// Screenshots accepted in a single update
pub const MAX_SCREENSHOTS_PER_UPDATE: u64 = 20;
/// Screenshots kept per (user, exam); older ones are dropped first
pub const MAX_STORED_SCREENSHOTS: i32 = 40;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScreenshotPayload {
    #[validate(length(min = 1, max = MAX_SCREENSHOT_URL_BYTES, message = "Screenshot url must be between 1 byte and 256 KB"))]
    pub url: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 64, message = "Screenshot type is required"))]
    pub kind: String,
    #[serde(rename = "detectedAt")]
    pub detected_at: Option<DateTime<Utc>>,
}

impl ScreenshotPayload {
    pub fn into_screenshot(self, now: DateTime<Utc>) -> Screenshot {
        Screenshot {
            url: self.url,
            kind: self.kind,
            detected_at: self.detected_at.unwrap_or(now),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveCheatingLogRequest {
    pub exam_id: String,
    #[serde(flatten)]
    pub counts: ViolationCounts,
    #[serde(default)]
    #[validate(length(max = MAX_SCREENSHOTS_PER_UPDATE, message = "At most 20 screenshots per update"), nested)]
    pub screenshots: Vec<ScreenshotPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotView {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheatingLogView {
    #[serde(rename = "_id")]
    pub id: String,
    pub exam_id: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
    #[serde(flatten)]
    pub counts: ViolationCounts,
    pub total_violations: u32,
    pub severity: Severity,
    pub screenshots: Vec<ScreenshotView>,
    pub updated_at: DateTime<Utc>,
}

impl From<CheatingLog> for CheatingLogView {
    fn from(log: CheatingLog) -> Self {
        let counts = log.counts();
        let total = counts.total();
        Self {
            id: id_hex(&log.id),
            exam_id: log.exam_id.to_hex(),
            user_id: log.user_id.to_hex(),
            username: log.username,
            email: log.email,
            counts,
            total_violations: total,
            severity: Severity::from_total(total),
            screenshots: log
                .screenshots
                .into_iter()
                .map(|s| ScreenshotView {
                    url: s.url,
                    kind: s.kind,
                    detected_at: s.detected_at,
                })
                .collect(),
            updated_at: log.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(Severity::from_total(0), Severity::None);
        assert_eq!(Severity::from_total(1), Severity::Low);
        assert_eq!(Severity::from_total(2), Severity::Low);
        assert_eq!(Severity::from_total(3), Severity::Medium);
        assert_eq!(Severity::from_total(5), Severity::Medium);
        assert_eq!(Severity::from_total(6), Severity::High);
    }

    #[test]
    fn test_request_counts_default_to_zero() {
        let req: SaveCheatingLogRequest = serde_json::from_value(serde_json::json!({
            "examId": "65f000000000000000000001",
            "cellPhoneCount": 2
        }))
        .unwrap();
        assert_eq!(req.counts.cell_phone_count, 2);
        assert_eq!(req.counts.no_face_count, 0);
        assert_eq!(req.counts.total(), 2);
        assert!(req.screenshots.is_empty());
    }

    #[test]
    fn test_view_reports_totals() {
        let log = CheatingLog {
            id: Some(ObjectId::new()),
            exam_id: ObjectId::new(),
            user_id: ObjectId::new(),
            username: "Alice".into(),
            email: "alice@example.com".into(),
            no_face_count: 3,
            multiple_face_count: 1,
            cell_phone_count: 2,
            prohibited_object_count: 0,
            screenshots: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(CheatingLogView::from(log)).unwrap();
        assert_eq!(json["totalViolations"], 6);
        assert_eq!(json["severity"], "high");
        assert_eq!(json["noFaceCount"], 3);
    }

    fn report_with(screenshots: Vec<serde_json::Value>) -> SaveCheatingLogRequest {
        serde_json::from_value(serde_json::json!({
            "examId": "65f000000000000000000001",
            "noFaceCount": 1,
            "screenshots": screenshots
        }))
        .unwrap()
    }

    #[test]
    fn test_screenshot_url_size_is_bounded() {
        let ok = report_with(vec![serde_json::json!({ "url": "data:image/png;base64,AAAA", "type": "noFace" })]);
        assert!(ok.validate().is_ok());

        let huge = "A".repeat(MAX_SCREENSHOT_URL_BYTES as usize + 1);
        let too_big = report_with(vec![serde_json::json!({ "url": huge, "type": "noFace" })]);
        assert!(too_big.validate().is_err());
    }

    #[test]
    fn test_screenshots_per_update_are_bounded() {
        let shot = serde_json::json!({ "url": "data:image/png;base64,AAAA", "type": "cellPhone" });
        let at_limit = report_with(vec![shot.clone(); MAX_SCREENSHOTS_PER_UPDATE as usize]);
        assert!(at_limit.validate().is_ok());

        let over = report_with(vec![shot; MAX_SCREENSHOTS_PER_UPDATE as usize + 1]);
        let errors = over.validate().unwrap_err();
        assert!(errors.errors().contains_key("screenshots"));
    }
}
