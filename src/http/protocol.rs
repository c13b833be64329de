//! JSON bodies exchanged with the site front end

use serde::{Deserialize, Serialize};

use crate::contact::{ContactError, EmailDispatchResult};

/// Successful contact submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,

    /// Provider delivery id, when the provider returned one
    #[serde(rename = "emailId", skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,
}

impl From<EmailDispatchResult> for ContactResponse {
    fn from(result: EmailDispatchResult) -> Self {
        Self {
            success: result.success,
            message: "Email sent successfully".to_string(),
            email_id: result.delivery_id,
        }
    }
}

/// Any failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl From<&ContactError> for ErrorResponse {
    fn from(err: &ContactError) -> Self {
        Self::new(err.to_string())
    }
}

/// Liveness check body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub email_configured: bool,
    /// Visitors with a live voice widget
    pub voice_clients: usize,
}

/// Contact form passed its inline checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
}
