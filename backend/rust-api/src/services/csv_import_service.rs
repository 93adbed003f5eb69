//! Bulk student provisioning from a Google Forms CSV export.

use anyhow::Result;
use mongodb::Database;
use serde::Serialize;

use super::user_service::{normalize_email, NewAccount, UserService};
use super::ServiceError;
use crate::metrics::USERS_IMPORTED_TOTAL;
use crate::models::user::{CreatedUser, UserRole};

/// Maximum entries echoed back per list in the import report
const REPORT_PREVIEW: usize = 10;

/// Form columns the importer understands; matched ignoring case and spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    FullName,
    Email,
    Phone,
    University,
    Department,
    AcademicYear,
}

fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn classify(header: &str) -> Option<Column> {
    match header_key(header).as_str() {
        "fullname" => Some(Column::FullName),
        "emailaddress" => Some(Column::Email),
        "phonenumber(whatsapp)" => Some(Column::Phone),
        "university/institution" => Some(Column::University),
        "department/program" => Some(Column::Department),
        "academicyear/experiencelevel" | "academicyear" => Some(Column::AcademicYear),
        _ => None,
    }
}

/// One usable row of the form export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub university: String,
    pub department: String,
    pub academic_year: String,
}

/// Parses the upload, keeping rows that carry a name, email and phone.
pub fn parse_google_form_csv(data: &[u8]) -> Result<Vec<ImportRow>, ServiceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| ServiceError::InvalidInput(format!("CSV parsing error: {}", e)))?
        .clone();
    let columns: Vec<Option<Column>> = headers.iter().map(classify).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| ServiceError::InvalidInput(format!("CSV parsing error: {}", e)))?;

        let mut row = ImportRow {
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            university: String::new(),
            department: String::new(),
            academic_year: String::new(),
        };
        for (column, value) in columns.iter().zip(record.iter()) {
            let value = value.trim().to_string();
            match column {
                Some(Column::FullName) => row.name = value,
                Some(Column::Email) => row.email = normalize_email(&value),
                Some(Column::Phone) => row.phone = value,
                Some(Column::University) => row.university = value,
                Some(Column::Department) => row.department = value,
                Some(Column::AcademicYear) => row.academic_year = value,
                None => {}
            }
        }

        if row.name.is_empty() || row.email.is_empty() || row.phone.is_empty() {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total_records: usize,
    pub success_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub message: String,
    pub summary: ImportSummary,
    pub created_users: Vec<CreatedUser>,
    pub skipped_users: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl ImportReport {
    fn build(
        total: usize,
        created: Vec<CreatedUser>,
        skipped: Vec<String>,
        errors: Vec<String>,
    ) -> Self {
        let summary = ImportSummary {
            total_records: total,
            success_count: created.len(),
            skipped_count: skipped.len(),
            error_count: errors.len(),
        };
        Self {
            message: "CSV Processing Complete".to_string(),
            summary,
            created_users: created.into_iter().take(REPORT_PREVIEW).collect(),
            skipped_users: skipped.into_iter().take(REPORT_PREVIEW).collect(),
            errors: (!errors.is_empty()).then_some(errors),
        }
    }
}

pub struct CsvImportService {
    users: UserService,
}

impl CsvImportService {
    pub fn new(mongo: Database) -> Self {
        Self {
            users: UserService::new(mongo),
        }
    }

    /// Creates a student per row; existing emails are skipped and
    /// per-row failures are reported without aborting the batch.
    pub async fn import(&self, data: &[u8]) -> Result<ImportReport> {
        let rows = parse_google_form_csv(data)?;
        let total = rows.len();

        let mut created = Vec::new();
        let mut skipped = Vec::new();
        let mut errors = Vec::new();

        for row in rows {
            match self.users.email_exists(&row.email).await {
                Ok(true) => {
                    USERS_IMPORTED_TOTAL.with_label_values(&["skipped"]).inc();
                    skipped.push(format!("User with email {} already exists", row.email));
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    USERS_IMPORTED_TOTAL.with_label_values(&["error"]).inc();
                    errors.push(format!("Error creating user {}: {}", row.email, e));
                    continue;
                }
            }

            let email = row.email.clone();
            let account = NewAccount {
                name: row.name,
                email: row.email,
                password: None,
                role: UserRole::Student,
                phone: row.phone,
                university: row.university,
                department: row.department,
                academic_year: row.academic_year,
            };
            match self.users.provision(account).await {
                Ok(user) => {
                    USERS_IMPORTED_TOTAL.with_label_values(&["created"]).inc();
                    created.push(user);
                }
                Err(e) => {
                    USERS_IMPORTED_TOTAL.with_label_values(&["error"]).inc();
                    tracing::warn!(email = %email, error = %e, "CSV row import failed");
                    errors.push(format!("Error creating user {}: {}", email, e));
                }
            }
        }

        tracing::info!(
            total,
            created = created.len(),
            skipped = skipped.len(),
            errors = errors.len(),
            "CSV import finished"
        );
        Ok(ImportReport::build(total, created, skipped, errors))
    }
}
