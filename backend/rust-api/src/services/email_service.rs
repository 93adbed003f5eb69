use anyhow::{anyhow, Context, Result};
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpSettings;
use crate::services::sms_service::login_url;

pub struct EmailService {
    settings: Option<SmtpSettings>,
    frontend_url: String,
}

impl EmailService {
    pub fn new(settings: Option<SmtpSettings>, frontend_url: String) -> Self {
        Self {
            settings,
            frontend_url,
        }
    }

    pub fn sending_disabled() -> bool {
        std::env::var("EMAIL_SEND_DISABLED")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// True when SMTP is configured and sending has not been switched off
    pub fn is_enabled(&self) -> bool {
        self.settings.is_some() && !Self::sending_disabled()
    }

    pub fn credentials_body(&self, name: &str, login: &str, password: &str) -> String {
        format!(
            "Hello {},\n\nYour CyberArena account credentials have been reset.\n\n\
             User ID: {}\n\
             Password: {}\n\n\
             Login: {}\n\n\
             Keep your credentials secure. Do not share them with anyone.\n",
            name,
            login,
            password,
            login_url(&self.frontend_url)
        )
    }

    pub async fn send_credentials_email(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        password: &str,
    ) -> Result<()> {
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| anyhow!("SMTP settings are not configured"))?;

        let from_address: Mailbox = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse()
            .context("Invalid from email address")?;
        let to_address: Mailbox = format!("{} <{}>", recipient_name, recipient_email)
            .parse()
            .context("Invalid recipient email address")?;

        let email = Message::builder()
            .from(from_address)
            .to(to_address)
            .subject("Your CyberArena login credentials")
            .body(self.credentials_body(recipient_name, recipient_email, password))
            .context("Failed to build email message")?;

        let mailer = Self::build_mailer(settings)?;
        mailer
            .send(email)
            .await
            .context("Failed to send credentials email")?;

        tracing::info!(recipient = %recipient_email, "Credentials email sent");
        Ok(())
    }

    fn build_mailer(settings: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(settings.login.clone(), settings.password.clone());

        let builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
                .context("Invalid SMTP server for TLS")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
        }
        .port(settings.port)
        .credentials(creds);

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_smtp() {
        let service = EmailService::new(None, "http://localhost:3000".into());
        assert!(!service.is_enabled());
    }

    #[test]
    fn test_credentials_body_is_parseable_by_sms_extractor() {
        let service = EmailService::new(None, "http://localhost:3000".into());
        let body = service.credentials_body("Ali", "ali@example.com", "Ab3dEf9h");
        let creds = crate::services::sms_service::extract_credentials(&body);
        assert_eq!(creds.login, "ali@example.com");
        assert_eq!(creds.password, "Ab3dEf9h");
        assert!(body.contains("http://localhost:3000/auth/login"));
    }
}
