//! Contact form payload and its validation rules

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// What the visitor is interested in, as picked on the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Interest {
    AiAutomation,
    CustomDevelopment,
    WebDevelopment,
    LeadGeneration,
    Consulting,
    AppDev,
    /// Anything the form did not offer; the raw value is kept for the email
    Other(String),
}

impl Default for Interest {
    fn default() -> Self {
        Self::AiAutomation
    }
}

impl Interest {
    /// Wire identifier used by the form
    pub fn as_str(&self) -> &str {
        match self {
            Interest::AiAutomation => "ai-automation",
            Interest::CustomDevelopment => "custom-development",
            Interest::WebDevelopment => "web-development",
            Interest::LeadGeneration => "lead-generation",
            Interest::Consulting => "consulting",
            Interest::AppDev => "app-dev",
            Interest::Other(raw) => raw,
        }
    }

    /// Human-readable label used in the email subject and body
    pub fn label(&self) -> &str {
        match self {
            Interest::AiAutomation => "AI & Automation",
            Interest::CustomDevelopment => "Custom App Development",
            Interest::WebDevelopment => "Web Development",
            Interest::LeadGeneration => "Lead Generation",
            Interest::Consulting => "Consulting",
            Interest::AppDev => "App Development",
            Interest::Other(raw) if raw.trim().is_empty() => "Other",
            Interest::Other(raw) => raw,
        }
    }
}

impl From<String> for Interest {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ai-automation" => Interest::AiAutomation,
            "custom-development" => Interest::CustomDevelopment,
            // older form builds sent the short id
            "web-development" | "web-dev" => Interest::WebDevelopment,
            "lead-generation" => Interest::LeadGeneration,
            "consulting" => Interest::Consulting,
            "app-dev" => Interest::AppDev,
            "other" => Interest::Other(String::new()),
            _ => Interest::Other(value),
        }
    }
}

impl From<Interest> for String {
    fn from(value: Interest) -> Self {
        match value {
            Interest::Other(raw) if raw.is_empty() => "other".to_string(),
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Interest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single contact form submission
///
/// Transient: built from the request body, validated, forwarded to the
/// email provider and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactSubmission {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub interest: Interest,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
}

/// `null` counts the same as a field left out
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Inline validation failures shown next to the form before anything is sent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Please enter your name")]
    MissingName,

    #[error("Please enter your email address")]
    MissingEmail,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Please enter a message")]
    MissingMessage,
}

fn email_shape() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"))
}

impl ContactSubmission {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        interest: Interest,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            interest,
            message: message.into(),
        }
    }

    /// Form-side checks, run before any request is made
    ///
    /// Fields are checked in the order they appear on the form and the first
    /// failure wins.
    pub fn validate_form(&self) -> Result<(), FormError> {
        if self.name.trim().is_empty() {
            return Err(FormError::MissingName);
        }
        if self.email.trim().is_empty() {
            return Err(FormError::MissingEmail);
        }
        if !email_shape().is_match(&self.email) {
            return Err(FormError::InvalidEmail);
        }
        if self.message.trim().is_empty() {
            return Err(FormError::MissingMessage);
        }
        Ok(())
    }

    /// Server-side presence check; the address format is not re-validated
    pub fn missing_required(&self) -> bool {
        self.name.is_empty() || self.email.is_empty() || self.message.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ContactSubmission {
        ContactSubmission::new("Ada", "ada@example.com", Interest::AiAutomation, "Hello")
    }

    #[test]
    fn test_interest_deserialization() {
        let body = r#"{"name":"Ada","email":"ada@example.com","interest":"lead-generation","message":"Hi"}"#;
        let submission: ContactSubmission = serde_json::from_str(body).unwrap();
        assert_eq!(submission.interest, Interest::LeadGeneration);
        assert_eq!(submission.interest.label(), "Lead Generation");
    }

    #[test]
    fn test_legacy_and_unknown_interest() {
        assert_eq!(Interest::from("web-dev".to_string()), Interest::WebDevelopment);

        let unknown = Interest::from("robotics".to_string());
        assert_eq!(unknown, Interest::Other("robotics".to_string()));
        assert_eq!(unknown.label(), "robotics");
        assert_eq!(Interest::from("other".to_string()).label(), "Other");
    }

    #[test]
    fn test_missing_fields_default() {
        let submission: ContactSubmission = serde_json::from_str(r#"{"name":"Ada"}"#).unwrap();
        assert_eq!(submission.email, "");
        assert_eq!(submission.interest, Interest::AiAutomation);
        assert!(submission.missing_required());
    }

    #[test]
    fn test_null_fields_read_as_empty() {
        let body = r#"{"name":null,"email":"ada@example.com","interest":null,"message":"Hi"}"#;
        let submission: ContactSubmission = serde_json::from_str(body).unwrap();
        assert_eq!(submission.name, "");
        assert_eq!(submission.interest, Interest::AiAutomation);
        assert!(submission.missing_required());
    }

    #[test]
    fn test_interest_serializes_to_wire_id() {
        let json = serde_json::to_string(&valid()).unwrap();
        assert!(json.contains(r#""interest":"ai-automation""#));
    }

    #[test]
    fn test_validate_form_order() {
        let mut s = ContactSubmission::default();
        assert_eq!(s.validate_form(), Err(FormError::MissingName));

        s.name = "Ada".into();
        assert_eq!(s.validate_form(), Err(FormError::MissingEmail));

        s.email = "ada@example".into();
        assert_eq!(s.validate_form(), Err(FormError::InvalidEmail));

        s.email = "ada@example.com".into();
        s.message = "   ".into();
        assert_eq!(s.validate_form(), Err(FormError::MissingMessage));

        assert_eq!(valid().validate_form(), Ok(()));
    }

    #[test]
    fn test_email_shape_rejects_whitespace() {
        let mut s = valid();
        s.email = "ada lovelace@example.com".into();
        assert_eq!(s.validate_form(), Err(FormError::InvalidEmail));
    }

    #[test]
    fn test_server_presence_check_skips_format() {
        let mut s = valid();
        s.email = "not-an-address".into();
        assert!(!s.missing_required());
    }
}
