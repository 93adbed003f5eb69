use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook};

use crate::metrics::EXPORTS_GENERATED_TOTAL;
use crate::models::result::ResultView;
use crate::models::user::UserCredentials;

pub const CREDENTIALS_FILENAME: &str = "user_credentials.csv";
pub const TEMPLATE_FILENAME: &str = "hackathon_user_upload_template.csv";
pub const RESULTS_CSV_FILENAME: &str = "exam_results.csv";
pub const RESULTS_XLSX_FILENAME: &str = "exam_results.xlsx";

const CREDENTIAL_HEADERS: [&str; 9] = [
    "User ID",
    "Name",
    "Email",
    "Role",
    "Password",
    "Phone",
    "University",
    "Department",
    "Created At",
];

const TEMPLATE_HEADERS: [&str; 6] = [
    "Full Name",
    "Email Address",
    "Phone Number (WhatsApp)",
    "University/Institution",
    "Department/Program",
    "Academic Year",
];

const TEMPLATE_SAMPLES: [[&str; 6]; 2] = [
    [
        "John Doe",
        "john@example.com",
        "03001234567",
        "Mehran University",
        "Computer Science",
        "2nd Year",
    ],
    [
        "Jane Smith",
        "jane@example.com",
        "03009876543",
        "Sindh University",
        "Cyber Security",
        "3rd Year",
    ],
];

const RESULT_HEADERS: [&str; 11] = [
    "Exam",
    "Student",
    "Email",
    "Total Marks",
    "Percentage",
    "Coding Marks",
    "Total Score",
    "Feedback",
    "Visible To Student",
    "Graded At",
    "Submitted At",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("csv") => Some(ExportFormat::Csv),
            Some("xlsx") | Some("excel") => Some(ExportFormat::Xlsx),
            _ => None,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn results_filename(&self) -> &'static str {
        match self {
            ExportFormat::Csv => RESULTS_CSV_FILENAME,
            ExportFormat::Xlsx => RESULTS_XLSX_FILENAME,
        }
    }
}

/// Neutralizes spreadsheet formulas by prefixing a tab; quoting is left to the writer
fn sanitize_cell(value: &str) -> String {
    if value.starts_with(['=', '+', '@', '-', '\t', '\r', '\n']) {
        format!("\t{}", value)
    } else {
        value.to_string()
    }
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn write_csv<I, R>(headers: &[&str], rows: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(headers)
        .context("Failed to write CSV header")?;
    for row in rows {
        let cells: Vec<String> = row.into_iter().map(|c| sanitize_cell(&c)).collect();
        writer
            .write_record(&cells)
            .context("Failed to write CSV row")?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e.error()))
}

pub fn credentials_csv(users: &[UserCredentials]) -> Result<Vec<u8>> {
    let rows = users.iter().map(|u| {
        vec![
            u.user_id.clone(),
            u.name.clone(),
            u.email.clone(),
            u.role.to_string(),
            u.generated_password.clone(),
            u.phone.clone(),
            u.university.clone(),
            u.department.clone(),
            format_timestamp(&u.created_at),
        ]
    });
    let bytes = write_csv(&CREDENTIAL_HEADERS, rows)?;
    EXPORTS_GENERATED_TOTAL.with_label_values(&["credentials_csv"]).inc();
    Ok(bytes)
}

pub fn upload_template_csv() -> Result<Vec<u8>> {
    let rows = TEMPLATE_SAMPLES
        .iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect::<Vec<_>>());
    write_csv(&TEMPLATE_HEADERS, rows)
}

fn result_row(result: &ResultView) -> Vec<String> {
    let (student, email) = result
        .user
        .as_ref()
        .map(|u| (u.name.clone(), u.email.clone()))
        .unwrap_or_default();
    let optional = |v: Option<f64>| v.map(|n| n.to_string()).unwrap_or_default();

    vec![
        result.exam_name.clone().unwrap_or_default(),
        student,
        email,
        result.total_marks.to_string(),
        format!("{:.2}", result.percentage),
        optional(result.coding_marks),
        optional(result.total_score),
        result.feedback.clone().unwrap_or_default(),
        if result.show_to_student { "yes" } else { "no" }.to_string(),
        result
            .graded_at
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_default(),
        format_timestamp(&result.created_at),
    ]
}

pub fn results_csv(results: &[ResultView]) -> Result<Vec<u8>> {
    let bytes = write_csv(&RESULT_HEADERS, results.iter().map(result_row))?;
    EXPORTS_GENERATED_TOTAL.with_label_values(&["csv"]).inc();
    Ok(bytes)
}

pub fn results_xlsx(results: &[ResultView]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Results")?;
    worksheet.set_column_width(0, 28.0)?;
    worksheet.set_column_width(1, 24.0)?;
    worksheet.set_column_width(2, 30.0)?;
    worksheet.set_column_width(7, 40.0)?;

    let header_format = Format::new().set_bold();
    for (col, header) in RESULT_HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (index, result) in results.iter().enumerate() {
        let row = index as u32 + 1;
        let cells = result_row(result);
        for (col, value) in cells.iter().enumerate() {
            let col = col as u16;
            match col {
                3 => worksheet.write_number(row, col, f64::from(result.total_marks))?,
                4 => worksheet.write_number(row, col, result.percentage)?,
                _ => worksheet.write_string(row, col, value)?,
            };
        }
    }

    let mut cursor = std::io::Cursor::new(Vec::new());
    workbook.save_to_writer(&mut cursor)?;
    EXPORTS_GENERATED_TOTAL.with_label_values(&["xlsx"]).inc();
    Ok(cursor.into_inner())
}

pub fn results_export(results: &[ResultView], format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => results_csv(results),
        ExportFormat::Xlsx => results_xlsx(results),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::result::ResultUser;
    use crate::models::user::UserRole;
    use std::collections::HashMap;

    fn credentials(name: &str) -> UserCredentials {
        UserCredentials {
            id: "65f000000000000000000001".into(),
            user_id: "alikhan1234".into(),
            name: name.into(),
            email: "ali@example.com".into(),
            role: UserRole::Student,
            phone: "03001234567".into(),
            generated_password: "Ab3dEf9h".into(),
            university: "NUST".into(),
            department: "CS".into(),
            academic_year: "3rd".into(),
            created_at: Utc::now(),
        }
    }

    fn result_view() -> ResultView {
        ResultView {
            id: "r1".into(),
            exam_id: "e1".into(),
            exam_name: Some("Network Security".into()),
            user_id: "u1".into(),
            user: Some(ResultUser {
                id: "u1".into(),
                name: "Ali Khan".into(),
                email: "ali@example.com".into(),
            }),
            answers: HashMap::new(),
            total_marks: 7,
            percentage: 70.0,
            show_to_student: true,
            coding_marks: Some(5.0),
            total_score: None,
            feedback: Some("Good, keep going".into()),
            graded_by: None,
            graded_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            coding_submissions: Vec::new(),
        }
    }

    #[test]
    fn test_sanitize_cell_blocks_formulas() {
        assert_eq!(sanitize_cell("=SUM(A1)"), "\t=SUM(A1)");
        assert_eq!(sanitize_cell("-1"), "\t-1");
        assert_eq!(sanitize_cell("plain"), "plain");
    }

    #[test]
    fn test_credentials_csv_layout() {
        let bytes = credentials_csv(&[credentials("Khan, Ali")]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "User ID,Name,Email,Role,Password,Phone,University,Department,Created At"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("alikhan1234,\"Khan, Ali\",ali@example.com,student,Ab3dEf9h,"));
    }

    #[test]
    fn test_credentials_csv_neutralizes_formula_names() {
        let bytes = credentials_csv(&[credentials("=HYPERLINK(\"x\")")]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"\t=HYPERLINK(\"\"x\"\")\""));
    }

    #[test]
    fn test_template_has_headers_and_samples() {
        let text = String::from_utf8(upload_template_csv().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Full Name,Email Address,Phone Number (WhatsApp)"));
        assert!(lines[1].contains("john@example.com"));
    }

    #[test]
    fn test_results_csv_row() {
        let text = String::from_utf8(results_csv(&[result_view()]).unwrap()).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with("Network Security,Ali Khan,ali@example.com,7,70.00,5,,"));
        assert!(row.contains("\"Good, keep going\",yes,,"));
    }

    #[test]
    fn test_results_xlsx_is_zip() {
        let bytes = results_xlsx(&[result_view()]).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!(ExportFormat::parse(None), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::parse(Some("XLSX")), Some(ExportFormat::Xlsx));
        assert_eq!(ExportFormat::parse(Some("pdf")), None);
    }
}
