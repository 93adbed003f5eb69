//! Browser SMS and WhatsApp deep links carrying login credentials.
//!
//! Nothing is sent from the server: the API builds `sms:` and `wa.me` URLs
//! that the teacher's device opens with the message pre-filled.

use anyhow::Result;
use lazy_static::lazy_static;
use mongodb::{bson::oid::ObjectId, Database};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

use super::user_service::UserService;
use super::ServiceError;
use crate::models::sms::{SmsBalanceResponse, SmsLinkResponse, WhatsAppLinkResponse};

/// Characters left alone by JavaScript's `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const MISSING: &str = "N/A";

lazy_static! {
    static ref USER_ID_LINE: Regex = Regex::new(r"User ID: ([^\n]+)").unwrap();
    static ref PASSWORD_LINE: Regex = Regex::new(r"Password: ([^\n]+)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Normalizes a local or international number to digits with the country code
pub fn format_phone(phone: &str, country_code: &str) -> String {
    let clean: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '+')
        .collect();

    if let Some(rest) = clean.strip_prefix('0') {
        format!("{}{}", country_code, rest)
    } else if clean.starts_with(country_code) {
        clean
    } else {
        format!("{}{}", country_code, clean)
    }
}

/// Pulls the `User ID:` and `Password:` lines out of a free-form message.
///
/// A missing line gives `N/A`; a line holding only whitespace gives an empty value.
pub fn extract_credentials(message: &str) -> Credentials {
    let capture = |re: &Regex| {
        re.captures(message)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| MISSING.to_string())
    };
    Credentials {
        login: capture(&USER_ID_LINE),
        password: capture(&PASSWORD_LINE),
    }
}

pub fn login_url(frontend_url: &str) -> String {
    format!("{}/auth/login", frontend_url.trim_end_matches('/'))
}

pub fn sms_message(credentials: &Credentials, frontend_url: &str) -> String {
    format!(
        "CyberArena Login Credentials:\n\n\
         📧 User ID: {}\n\
         🔑 Password: {}\n\n\
         🌐 Login: {}\n\n\
         ⚠️ Keep your credentials secure. Do not share with anyone.",
        credentials.login,
        credentials.password,
        login_url(frontend_url)
    )
}

pub fn sms_url(phone: &str, body: &str) -> String {
    format!("sms:{}?body={}", phone, encode_component(body))
}

pub fn whatsapp_message(
    name: &str,
    credentials: &Credentials,
    role: &str,
    frontend_url: &str,
) -> String {
    format!(
        "🎯 *CyberArena Login Credentials* 🎯\n\n\
         👤 *User Details:*\n\
         • Name: {name}\n\
         • User ID: {login}\n\
         • Password: {password}\n\
         • Role: {role}\n\n\
         🔐 *Login Instructions:*\n\
         1. Visit: {url}\n\
         2. Use your User ID and Password above\n\
         3. Change your password after first login\n\n\
         📱 *Need Help?*\n\
         Contact your administrator for support.\n\n\
         _Keep your credentials secure and don't share them with anyone._",
        login = credentials.login,
        password = credentials.password,
        url = login_url(frontend_url),
    )
}

pub fn whatsapp_url(phone: &str, text: &str) -> String {
    format!("https://wa.me/{}?text={}", phone, encode_component(text))
}

pub struct SmsService {
    mongo: Database,
    frontend_url: String,
    country_code: String,
}

impl SmsService {
    pub fn new(mongo: Database, frontend_url: String, country_code: String) -> Self {
        Self {
            mongo,
            frontend_url,
            country_code,
        }
    }

    pub fn sms_link(&self, to: &str, message: &str) -> SmsLinkResponse {
        let phone = format_phone(to, &self.country_code);
        let credentials = extract_credentials(message);
        let body = sms_message(&credentials, &self.frontend_url);

        tracing::debug!(phone = %phone, "SMS link generated");
        SmsLinkResponse {
            success: true,
            message: "Browser SMS ready to send".to_string(),
            sms_url: sms_url(&phone, &body),
            phone,
            provider: "Browser SMS".to_string(),
            instruction: "Click the SMS button to open messaging app with pre-filled credentials"
                .to_string(),
        }
    }

    /// WhatsApp link with the stored credentials of `user_id`
    pub async fn whatsapp_link(&self, user_id: &ObjectId) -> Result<WhatsAppLinkResponse> {
        let user = UserService::new(self.mongo.clone()).get_user(user_id).await?;

        let raw_phone = user.phone.trim();
        if raw_phone.is_empty() {
            return Err(ServiceError::InvalidInput(
                "No phone number available for this user".to_string(),
            )
            .into());
        }
        if user.generated_password.is_empty() {
            return Err(
                ServiceError::InvalidInput("Please generate a password first".to_string()).into(),
            );
        }

        let phone = format_phone(raw_phone, &self.country_code);
        let credentials = Credentials {
            login: user.email.clone(),
            password: user.generated_password.clone(),
        };
        let text = whatsapp_message(
            &user.name,
            &credentials,
            user.role.as_str(),
            &self.frontend_url,
        );

        tracing::info!(user_id = %user_id.to_hex(), "WhatsApp link generated");
        Ok(WhatsAppLinkResponse {
            success: true,
            message: "WhatsApp link ready".to_string(),
            whatsapp_url: whatsapp_url(&phone, &text),
            phone,
        })
    }

    pub fn balance() -> SmsBalanceResponse {
        SmsBalanceResponse {
            success: true,
            balance: "Browser SMS - Always Available".to_string(),
            message: "Browser SMS is free and always available".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_phone_variants() {
        assert_eq!(format_phone("0300 1234567", "92"), "923001234567");
        assert_eq!(format_phone("+92-300-1234567", "92"), "923001234567");
        assert_eq!(format_phone("3001234567", "92"), "923001234567");
        assert_eq!(format_phone("923001234567", "92"), "923001234567");
    }

    #[test]
    fn test_extract_credentials() {
        let creds = extract_credentials("Hello\nUser ID: ali@example.com \nPassword: Ab12Cd34\n");
        assert_eq!(creds.login, "ali@example.com");
        assert_eq!(creds.password, "Ab12Cd34");
    }

    #[test]
    fn test_extract_credentials_missing_lines() {
        let creds = extract_credentials("nothing useful here");
        assert_eq!(creds.login, "N/A");
        assert_eq!(creds.password, "N/A");
    }

    #[test]
    fn test_extract_credentials_blank_line_is_empty() {
        let creds = extract_credentials("User ID:    \nPassword: Ab12Cd34");
        assert_eq!(creds.login, "");
        assert_eq!(creds.password, "Ab12Cd34");
    }

    #[test]
    fn test_encode_component_matches_uri_component_rules() {
        assert_eq!(encode_component("a b&c"), "a%20b%26c");
        assert_eq!(encode_component("keep-_.!~*'()"), "keep-_.!~*'()");
        assert_eq!(encode_component("\n"), "%0A");
    }

    #[test]
    fn test_sms_url_contains_login_link() {
        let creds = Credentials {
            login: "ali@example.com".into(),
            password: "pw".into(),
        };
        let body = sms_message(&creds, "https://arena.example.com/");
        assert!(body.contains("🌐 Login: https://arena.example.com/auth/login"));

        let url = sms_url("923001234567", &body);
        assert!(url.starts_with("sms:923001234567?body=CyberArena%20Login%20Credentials"));
        assert!(!url.contains(' '));
    }

    #[test]
    fn test_whatsapp_url() {
        let creds = Credentials {
            login: "ali@example.com".into(),
            password: "pw".into(),
        };
        let text = whatsapp_message("Ali", &creds, "student", "http://localhost:3000");
        assert!(text.contains("• Name: Ali"));
        assert!(text.contains("• Role: student"));
        assert!(text.contains("1. Visit: http://localhost:3000/auth/login"));

        let url = whatsapp_url("923001234567", &text);
        assert!(url.starts_with("https://wa.me/923001234567?text="));
    }
}
