use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono, id_hex};

/// User model stored in MongoDB "users" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Generated login id (`cleanname1234`); absent on accounts created before generation existed
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(rename = "password")]
    pub password_hash: String,
    pub role: UserRole,
    #[serde(default)]
    pub phone: String,
    /// Plain copy of the last generated password, shown to teachers for distribution
    #[serde(rename = "generatedPassword", default)]
    pub generated_password: String,
    #[serde(default)]
    pub university: String,
    #[serde(default)]
    pub department: String,
    #[serde(rename = "academicYear", default)]
    pub academic_year: String,
    #[serde(rename = "participationType", default)]
    pub participation_type: String,
    #[serde(rename = "previousParticipation", default)]
    pub previous_participation: String,
    #[serde(rename = "technicalSkills", default)]
    pub technical_skills: String,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub const COLLECTION: &'static str = "users";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Teacher,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "teacher" => Ok(UserRole::Teacher),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Public profile returned by login and `/users/profile`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub role: UserRole,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: id_hex(&user.id),
            name: user.name.clone(),
            email: user.email.clone(),
            user_id: user.user_id.clone(),
            role: user.role,
        }
    }
}

/// User row for teacher listings; never carries the hash
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: String,
    pub university: String,
    pub department: String,
    pub academic_year: String,
    pub participation_type: String,
    pub previous_participation: String,
    pub technical_skills: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: id_hex(&user.id),
            user_id: user.user_id,
            username: user.username,
            name: user.name,
            email: user.email,
            role: user.role,
            phone: user.phone,
            university: user.university,
            department: user.department,
            academic_year: user.academic_year,
            participation_type: user.participation_type,
            previous_participation: user.previous_participation,
            technical_skills: user.technical_skills,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Credential sheet row (teacher view and CSV download)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCredentials {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: String,
    pub generated_password: String,
    pub university: String,
    pub department: String,
    pub academic_year: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserCredentials {
    fn from(user: User) -> Self {
        Self {
            id: id_hex(&user.id),
            user_id: user.user_id.unwrap_or_default(),
            name: user.name,
            email: user.email,
            role: user.role,
            phone: user.phone,
            generated_password: user.generated_password,
            university: user.university,
            department: user.department,
            academic_year: user.academic_year,
            created_at: user.created_at,
        }
    }
}

/// Freshly provisioned account, including its plain password
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: String,
    pub generated_password: String,
    pub university: String,
    pub department: String,
    pub academic_year: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoginRequest {
    /// Email address or generated user id
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    pub token: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub phone: Option<String>,
    pub university: Option<String>,
    pub department: Option<String>,
    pub academic_year: Option<String>,
}

#[derive(Debug, Deserialize, Validate, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub phone: Option<String>,
    pub university: Option<String>,
    pub department: Option<String>,
    pub academic_year: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetCredentialsResponse {
    pub user_id: String,
    pub email: String,
    pub generated_password: String,
    pub email_sent: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;

    fn sample_user() -> User {
        User {
            id: Some(ObjectId::new()),
            user_id: Some("alicesmith4821".into()),
            username: Some("alice".into()),
            name: "Alice Smith".into(),
            email: "alice@example.com".into(),
            password_hash: "$2b$10$hash".into(),
            role: UserRole::Student,
            phone: "03001234567".into(),
            generated_password: "Ab3dEf9h".into(),
            university: "NUST".into(),
            department: "CS".into(),
            academic_year: "3rd".into(),
            participation_type: String::new(),
            previous_participation: String::new(),
            technical_skills: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_document_uses_camel_case_field_names() {
        let doc = bson::to_document(&sample_user()).unwrap();
        assert!(doc.contains_key("userId"));
        assert!(doc.contains_key("password"));
        assert!(doc.contains_key("generatedPassword"));
        assert_eq!(doc.get_str("role").unwrap(), "student");
    }

    #[test]
    fn test_missing_generated_fields_are_not_stored() {
        let mut user = sample_user();
        user.user_id = None;
        user.username = None;
        let doc = bson::to_document(&user).unwrap();
        // sparse unique indexes rely on the keys being absent
        assert!(!doc.contains_key("userId"));
        assert!(!doc.contains_key("username"));
    }

    #[test]
    fn test_summary_hides_password() {
        let json = serde_json::to_value(UserSummary::from(sample_user())).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("generatedPassword").is_none());
        assert_eq!(json["userId"], "alicesmith4821");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Teacher".parse::<UserRole>().unwrap(), UserRole::Teacher);
        assert!("admin".parse::<UserRole>().is_err());
        assert_eq!(UserRole::default(), UserRole::Student);
    }
}
