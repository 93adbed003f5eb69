use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
pub struct SendSmsRequest {
    pub to: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SmsLinkResponse {
    pub success: bool,
    pub message: String,
    pub sms_url: String,
    pub phone: String,
    pub provider: String,
    pub instruction: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppRequest {
    /// Mongo `_id` of the user whose credentials are shared
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WhatsAppLinkResponse {
    pub success: bool,
    pub message: String,
    pub whatsapp_url: String,
    pub phone: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SmsBalanceResponse {
    pub success: bool,
    pub balance: String,
    pub message: String,
}
