use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    extractors::ValidJson,
    handlers::{download, error::{parse_object_id, ApiError}},
    middlewares::auth::JwtClaims,
    models::user::{
        CreateUserRequest, CreatedUser, ResetCredentialsResponse, UpdateUserRequest, UserSummary,
    },
    services::{
        csv_import_service::CsvImportService,
        email_service::EmailService,
        export_service::{self, CREDENTIALS_FILENAME, TEMPLATE_FILENAME},
        user_service::UserService,
        AppState,
    },
};

/// Multipart field carrying the roster file
const UPLOAD_FIELD: &str = "usersFile";
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// POST /api/users - Create a user (teacher)
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreatedUser>), ApiError> {
    tracing::info!(created_by = %claims.sub, "Creating user {}", req.email);

    let user = UserService::new(state.mongo.clone()).create_user(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let users = UserService::new(state.mongo.clone()).list_users().await?;
    Ok(Json(users))
}

/// PUT /api/users/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateUserRequest>,
) -> Result<Json<UserSummary>, ApiError> {
    let user_id = parse_object_id(&id, "user id")?;
    let user = UserService::new(state.mongo.clone())
        .update_user(&user_id, req)
        .await?;
    Ok(Json(user))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let target = parse_object_id(&id, "user id")?;
    let acting = claims.user_id()?;

    UserService::new(state.mongo.clone())
        .delete_user(&acting, &target)
        .await?;

    Ok(Json(json!({ "message": "User removed successfully" })))
}

/// POST /api/users/{id}/reset-credentials
///
/// The new password is always returned; e-mail delivery is best effort.
pub async fn reset_credentials(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ResetCredentialsResponse>, ApiError> {
    let user_id = parse_object_id(&id, "user id")?;
    let (user, password) = UserService::new(state.mongo.clone())
        .reset_password(&user_id)
        .await?;

    let email_service = EmailService::new(state.config.smtp.clone(), state.config.frontend_url.clone());
    let email_sent = if email_service.is_enabled() {
        match email_service
            .send_credentials_email(&user.email, &user.name, &password)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "Credentials email failed");
                false
            }
        }
    } else {
        false
    };

    let message = if email_sent {
        "Credentials reset and emailed to the user"
    } else {
        "Credentials reset"
    };

    Ok(Json(ResetCredentialsResponse {
        user_id: user.user_id.unwrap_or_default(),
        email: user.email,
        generated_password: password,
        email_sent,
        message: message.to_string(),
    }))
}

/// GET /api/users/with-passwords
pub async fn list_with_passwords(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let users = UserService::new(state.mongo.clone())
        .list_credentials()
        .await?;
    Ok(Json(json!({ "users": users })))
}

/// GET /api/users/with-passwords/csv
pub async fn download_credentials_csv(
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let users = UserService::new(state.mongo.clone())
        .list_credentials()
        .await?;
    let bytes = export_service::credentials_csv(&users)?;
    Ok(download(bytes, CSV_CONTENT_TYPE, CREDENTIALS_FILENAME))
}

/// GET /api/users/csv-template
pub async fn download_template() -> Result<Response, ApiError> {
    let bytes = export_service::upload_template_csv()?;
    Ok(download(bytes, CSV_CONTENT_TYPE, TEMPLATE_FILENAME))
}

fn is_csv_upload(file_name: Option<&str>, content_type: Option<&str>) -> bool {
    let by_name = file_name
        .map(|n| n.to_ascii_lowercase().ends_with(".csv"))
        .unwrap_or(false);
    let by_type = content_type
        .map(|t| t.starts_with("text/csv"))
        .unwrap_or(false);
    by_name || by_type
}

/// POST /api/users/upload-csv - Bulk account creation from a Google Forms export
pub async fn upload_csv(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut data = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        if !is_csv_upload(field.file_name(), field.content_type()) {
            return Err(ApiError::bad_request("Only CSV files are allowed"));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::bad_request("File too large (max 5MB)"));
        }
        data = Some(bytes);
        break;
    }

    let data = data.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    tracing::info!(bytes = data.len(), "Processing user CSV upload");

    let report = CsvImportService::new(state.mongo.clone())
        .import(&data)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_upload_detection() {
        assert!(is_csv_upload(Some("Responses.CSV"), None));
        assert!(is_csv_upload(Some("export"), Some("text/csv")));
        assert!(!is_csv_upload(Some("roster.xlsx"), Some("application/octet-stream")));
        assert!(!is_csv_upload(None, None));
    }
}
