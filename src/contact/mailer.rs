//! Email provider binding
//!
//! The provider is an opaque service: it takes a formatted message and
//! answers with a delivery id or a status-coded failure.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MailSettings;

use super::submission::ContactSubmission;

/// A fully formatted message ready for the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub reply_to: String,
}

impl OutgoingEmail {
    /// Format a contact submission with the configured sender/recipient pair
    pub fn from_submission(submission: &ContactSubmission, settings: &MailSettings) -> Self {
        let interest = submission.interest.label();
        let text = format!(
            "\nName: {}\nEmail: {}\nInterest: {}\n\nMessage:\n{}\n\n---\nSent from your portfolio contact form\n",
            submission.name, submission.email, interest, submission.message,
        );

        Self {
            from: settings.from.clone(),
            to: settings.to.clone(),
            subject: format!("New Contact from {} - {}", submission.name, interest),
            text,
            reply_to: submission.email.clone(),
        }
    }
}

/// What the provider hands back for an accepted message
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeliveryReceipt {
    pub id: Option<String>,
}

/// Failures reported by the email provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Rejected { status, .. } => Some(*status),
            ProviderError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt, ProviderError>;
}

/// Request body of the Resend `/emails` endpoint
#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    reply_to: &'a str,
}

#[derive(Deserialize)]
struct ResendErrorBody {
    #[serde(default)]
    message: String,
}

/// Resend-backed email provider
pub struct ResendMailer {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
}

impl ResendMailer {
    /// Build a mailer from settings; `None` when no API key is configured
    pub fn from_settings(settings: &MailSettings) -> Option<Self> {
        let key = settings.api_key.as_deref()?.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key.to_string(), settings.api_url.clone()))
    }

    pub fn new(api_key: String, api_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl EmailProvider for ResendMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt, ProviderError> {
        let url = format!("{}/emails", self.api_url);
        let body = ResendRequest {
            from: &email.from,
            to: [email.to.as_str()],
            subject: &email.subject,
            text: &email.text,
            reply_to: &email.reply_to,
        };

        debug!(%url, subject = %email.subject, "sending email");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ResendErrorBody>()
                .await
                .map(|b| b.message)
                .unwrap_or_default();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<DeliveryReceipt>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Interest;

    #[test]
    fn test_email_formatting() {
        let submission =
            ContactSubmission::new("Ada", "ada@example.com", Interest::AiAutomation, "Hello");
        let email = OutgoingEmail::from_submission(&submission, &MailSettings::default());

        assert_eq!(email.subject, "New Contact from Ada - AI & Automation");
        assert_eq!(email.reply_to, "ada@example.com");
        assert!(email.text.contains("Name: Ada"));
        assert!(email.text.contains("Interest: AI & Automation"));
        assert!(email.text.contains("Message:\nHello"));
        assert!(email.text.contains("Sent from your portfolio contact form"));
    }

    #[test]
    fn test_mailer_requires_key() {
        assert!(ResendMailer::from_settings(&MailSettings::default()).is_none());

        let settings = MailSettings {
            api_key: Some("re_test".to_string()),
            ..MailSettings::default()
        };
        assert!(ResendMailer::from_settings(&settings).is_some());
    }

    #[test]
    fn test_request_body_shape() {
        let body = ResendRequest {
            from: "a@example.com",
            to: ["b@example.com"],
            subject: "s",
            text: "t",
            reply_to: "c@example.com",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["to"][0], "b@example.com");
        assert_eq!(json["reply_to"], "c@example.com");
    }

    #[test]
    fn test_rejected_status() {
        let err = ProviderError::Rejected {
            status: 429,
            message: "slow down".to_string(),
        };
        assert_eq!(err.status(), Some(429));
    }
}
