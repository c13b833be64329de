//! Contact relay: validate, format, forward once, categorize failures

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::MailSettings;

use super::mailer::{EmailProvider, OutgoingEmail, ProviderError};
use super::submission::ContactSubmission;

/// User-facing bucket for a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Provider refused our credentials (403)
    Configuration,
    /// Provider is throttling us (429)
    RateLimited,
    /// Provider rejected the payload (400)
    InvalidRequest,
    Generic,
}

impl ErrorCategory {
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(403) => ErrorCategory::Configuration,
            Some(429) => ErrorCategory::RateLimited,
            Some(400) => ErrorCategory::InvalidRequest,
            _ => ErrorCategory::Generic,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => {
                "Email configuration error. The site admin has been notified."
            }
            ErrorCategory::RateLimited => {
                "Too many messages sent. Please try again in a few minutes."
            }
            ErrorCategory::InvalidRequest => {
                "Invalid request. Please check your information and try again."
            }
            ErrorCategory::Generic => "Failed to send email. Please try again later.",
        }
    }
}

/// Outcome of a single provider send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailDispatchResult {
    pub success: bool,
    pub delivery_id: Option<String>,
    pub error_category: Option<ErrorCategory>,
}

impl EmailDispatchResult {
    fn delivered(delivery_id: Option<String>) -> Self {
        Self {
            success: true,
            delivery_id,
            error_category: None,
        }
    }

    fn failed(category: ErrorCategory) -> Self {
        Self {
            success: false,
            delivery_id: None,
            error_category: Some(category),
        }
    }
}

/// Why a submission did not result in a delivered email
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("Name, email, and message are required")]
    MissingFields,

    #[error("Contact form is not properly configured. Please notify the site administrator.")]
    NotConfigured,

    #[error("{}", .0.user_message())]
    Delivery(ErrorCategory),
}

impl ContactError {
    /// HTTP status the handler answers with
    pub fn status_code(&self) -> u16 {
        match self {
            ContactError::MissingFields => 400,
            ContactError::NotConfigured | ContactError::Delivery(_) => 500,
        }
    }
}

/// Relays contact submissions to the email provider
pub struct ContactService {
    provider: Option<Arc<dyn EmailProvider>>,
    settings: MailSettings,
}

impl ContactService {
    /// Create a service; a missing provider is reported per request, not at startup
    pub fn new(provider: Option<Arc<dyn EmailProvider>>, settings: MailSettings) -> Self {
        if provider.is_none() {
            warn!("email provider not configured, contact submissions will be refused");
        }
        Self { provider, settings }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Handle one submission
    ///
    /// Exactly one provider send is made for a complete submission. Nothing
    /// is retried and nothing is deduplicated.
    pub async fn submit(
        &self,
        submission: &ContactSubmission,
    ) -> Result<EmailDispatchResult, ContactError> {
        if submission.missing_required() {
            return Err(ContactError::MissingFields);
        }

        let Some(provider) = self.provider.as_ref() else {
            error!("email service not configured: RESEND_API_KEY is missing");
            return Err(ContactError::NotConfigured);
        };

        let email = OutgoingEmail::from_submission(submission, &self.settings);

        info!(
            name = %submission.name,
            email = %submission.email,
            interest = %submission.interest,
            from = %self.settings.from,
            "contact form submission"
        );

        let result = Self::dispatch(provider.as_ref(), &email).await;
        match result.error_category {
            Some(category) => Err(ContactError::Delivery(category)),
            None => Ok(result),
        }
    }

    async fn dispatch(provider: &dyn EmailProvider, email: &OutgoingEmail) -> EmailDispatchResult {
        match provider.send(email).await {
            Ok(receipt) => {
                info!(email_id = ?receipt.id, "email sent");
                EmailDispatchResult::delivered(receipt.id)
            }
            Err(e) => {
                let category = ErrorCategory::from_status(e.status());
                match &e {
                    ProviderError::Rejected { status, message } => {
                        error!(status, %message, ?category, "email provider rejected message");
                    }
                    ProviderError::Transport(err) => {
                        error!(?err, ?category, "email provider request failed");
                    }
                }
                EmailDispatchResult::failed(category)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::contact::mailer::DeliveryReceipt;
    use crate::contact::Interest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Provider that records every message and answers with a fixed outcome
    pub(crate) struct RecordingProvider {
        pub sent: Mutex<Vec<OutgoingEmail>>,
        reject_with: Option<u16>,
    }

    impl RecordingProvider {
        pub(crate) fn accepting() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                reject_with: None,
            })
        }

        pub(crate) fn rejecting(status: u16) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                reject_with: Some(status),
            })
        }

        pub(crate) fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EmailProvider for RecordingProvider {
        async fn send(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt, ProviderError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(email.clone());
            match self.reject_with {
                Some(status) => Err(ProviderError::Rejected {
                    status,
                    message: "rejected".to_string(),
                }),
                None => Ok(DeliveryReceipt {
                    id: Some(format!("email-{}", sent.len())),
                }),
            }
        }
    }

    fn service_with(provider: Arc<RecordingProvider>) -> ContactService {
        ContactService::new(Some(provider as Arc<dyn EmailProvider>), MailSettings::default())
    }

    fn ada() -> ContactSubmission {
        ContactSubmission::new("Ada", "ada@example.com", Interest::AiAutomation, "Hello")
    }

    #[tokio::test]
    async fn test_successful_submission() {
        let provider = RecordingProvider::accepting();
        let service = service_with(provider.clone());

        let result = service.submit(&ada()).await.unwrap();
        assert!(result.success);
        assert!(result.delivery_id.as_deref().is_some_and(|id| !id.is_empty()));

        let sent = provider.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_to, "ada@example.com");
        assert!(sent[0].text.contains("Ada"));
        assert!(sent[0].text.contains("AI & Automation"));
    }

    #[tokio::test]
    async fn test_missing_fields_skip_provider() {
        let provider = RecordingProvider::accepting();
        let service = service_with(provider.clone());

        for blank in ["name", "email", "message"] {
            let mut submission = ada();
            match blank {
                "name" => submission.name.clear(),
                "email" => submission.email.clear(),
                _ => submission.message.clear(),
            }
            let err = service.submit(&submission).await.unwrap_err();
            assert_eq!(err, ContactError::MissingFields);
            assert_eq!(err.status_code(), 400);
        }

        assert_eq!(provider.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let service = ContactService::new(None, MailSettings::default());
        let err = service.submit(&ada()).await.unwrap_err();
        assert_eq!(err, ContactError::NotConfigured);
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_rate_limit_is_distinct() {
        let service = service_with(RecordingProvider::rejecting(429));
        let err = service.submit(&ada()).await.unwrap_err();

        assert_eq!(err, ContactError::Delivery(ErrorCategory::RateLimited));
        assert!(err.to_string().contains("Too many messages"));
        assert_ne!(err.to_string(), ErrorCategory::Generic.user_message());
    }

    #[tokio::test]
    async fn test_provider_failures_are_not_retried() {
        let provider = RecordingProvider::rejecting(500);
        let service = service_with(provider.clone());

        let err = service.submit(&ada()).await.unwrap_err();
        assert_eq!(err, ContactError::Delivery(ErrorCategory::Generic));
        assert_eq!(provider.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_submissions_send_twice() {
        let provider = RecordingProvider::accepting();
        let service = service_with(provider.clone());

        service.submit(&ada()).await.unwrap();
        service.submit(&ada()).await.unwrap();
        assert_eq!(provider.sent_count(), 2);
    }

    #[test]
    fn test_status_categories() {
        assert_eq!(ErrorCategory::from_status(Some(403)), ErrorCategory::Configuration);
        assert_eq!(ErrorCategory::from_status(Some(400)), ErrorCategory::InvalidRequest);
        assert_eq!(ErrorCategory::from_status(Some(502)), ErrorCategory::Generic);
        assert_eq!(ErrorCategory::from_status(None), ErrorCategory::Generic);
    }
}
