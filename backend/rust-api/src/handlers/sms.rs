use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    extractors::AppJson,
    handlers::error::{parse_object_id, ApiError},
    models::sms::{
        SendSmsRequest, SmsBalanceResponse, SmsLinkResponse, WhatsAppLinkResponse,
        WhatsAppRequest,
    },
    services::{sms_service::SmsService, AppState},
};

fn sms_service(state: &AppState) -> SmsService {
    SmsService::new(
        state.mongo.clone(),
        state.config.frontend_url.clone(),
        state.config.phone_country_code.clone(),
    )
}

/// POST /api/sms/send - Prefilled `sms:` link with the credentials found in `message`
pub async fn send_sms(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<SendSmsRequest>,
) -> Result<Json<SmsLinkResponse>, ApiError> {
    let to = req.to.unwrap_or_default();
    let message = req.message.unwrap_or_default();
    if to.trim().is_empty() || message.trim().is_empty() {
        return Err(ApiError::bad_request("Phone number and message are required"));
    }

    Ok(Json(sms_service(&state).sms_link(&to, &message)))
}

/// POST /api/sms/whatsapp
pub async fn whatsapp_link(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<WhatsAppRequest>,
) -> Result<Json<WhatsAppLinkResponse>, ApiError> {
    let user_id = parse_object_id(&req.user_id, "userId")?;
    let link = sms_service(&state).whatsapp_link(&user_id).await?;
    Ok(Json(link))
}

/// GET /api/sms/balance
pub async fn balance() -> Json<SmsBalanceResponse> {
    Json(SmsService::balance())
}
