use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mongodb::bson::oid::ObjectId;
use serde_json::json;
use validator::ValidationErrors;

use crate::services::ServiceError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(service_err) = err.downcast_ref::<ServiceError>() {
            return match service_err {
                ServiceError::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
                ServiceError::Unauthorized(msg) => ApiError::Unauthorized(msg.clone()),
                ServiceError::Forbidden(msg) => ApiError::Forbidden(msg.clone()),
                ServiceError::NotFound(msg) => ApiError::NotFound(msg.clone()),
                ServiceError::Conflict(msg) => ApiError::Conflict(msg.clone()),
                ServiceError::Locked(msg) => ApiError::TooManyRequests(msg.clone()),
            };
        }

        tracing::error!(error = ?err, "Request failed");
        ApiError::Internal(err.to_string())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {}", field))
                })
            })
            .next()
            .unwrap_or_else(|| format!("Validation failed: {}", errors));
        ApiError::BadRequest(message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::TooManyRequests(m)
            | ApiError::Internal(m) => m,
        };

        let body = Json(json!({
            "success": false,
            "message": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub fn parse_object_id(value: &str, field: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(value)
        .map_err(|_| ApiError::bad_request(format!("Invalid {}: must be ObjectId", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Payload {
        #[validate(length(min = 3, message = "too short"))]
        name: String,
    }

    #[test]
    fn test_service_errors_map_to_status() {
        let err: ApiError = anyhow::Error::new(ServiceError::NotFound("User not found".into())).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = anyhow::Error::new(ServiceError::Conflict("taken".into()))
            .context("Failed to create user")
            .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_message_is_used() {
        let errors = Payload { name: "ab".into() }.validate().unwrap_err();
        match ApiError::from(errors) {
            ApiError::BadRequest(msg) => assert_eq!(msg, "too short"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_object_id() {
        assert!(parse_object_id("not-an-id", "examId").is_err());
        assert!(parse_object_id("65f000000000000000000001", "examId").is_ok());
    }
}
