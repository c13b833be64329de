//! Configuration loading and management

use std::net::SocketAddr;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com";
const DEFAULT_EMAIL_FROM: &str = "Portfolio Contact <hello@hello.lucalobos.co>";
const DEFAULT_EMAIL_TO: &str = "luca.lobosco@hotmail.com";
const DEFAULT_VOICE_AGENT_ID: &str = "7NSUdhtcq1J4ZU1507Bi";
const DEFAULT_VOICE_API_URL: &str = "wss://api.elevenlabs.io/v1/convai/conversation";

/// Errors raised while reading configuration from the environment
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Sender/recipient pair and provider credentials for the contact relay
#[derive(Debug, Clone)]
pub struct MailSettings {
    /// Resend API key; the contact form reports a configuration error without it
    pub api_key: Option<String>,

    /// Base URL of the email provider API
    pub api_url: String,

    /// From header, must be a verified sender at the provider
    pub from: String,

    /// Where contact submissions are delivered
    pub to: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_RESEND_API_URL.to_string(),
            from: DEFAULT_EMAIL_FROM.to_string(),
            to: DEFAULT_EMAIL_TO.to_string(),
        }
    }
}

/// Voice assistant provider settings
#[derive(Debug, Clone)]
pub struct VoiceSettings {
    /// Conversational agent every session is keyed by
    pub agent_id: String,

    /// Websocket endpoint of the conversation provider
    pub api_url: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            agent_id: DEFAULT_VOICE_AGENT_ID.to_string(),
            api_url: DEFAULT_VOICE_API_URL.to_string(),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_address: SocketAddr,

    pub mail: MailSettings,

    pub voice: VoiceSettings,
}

impl Config {
    /// Load configuration from environment and defaults
    ///
    /// A `.env` file in the working directory is read first when present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_str = var("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address = bind_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let mail_defaults = MailSettings::default();
        let mail = MailSettings {
            api_key: var("RESEND_API_KEY").map(|k| k.trim().to_string()),
            api_url: var("RESEND_API_URL").unwrap_or(mail_defaults.api_url),
            from: var("EMAIL_FROM").unwrap_or(mail_defaults.from),
            to: var("EMAIL_TO").unwrap_or(mail_defaults.to),
        };

        let voice_defaults = VoiceSettings::default();
        let voice = VoiceSettings {
            agent_id: var("VOICE_AGENT_ID").unwrap_or(voice_defaults.agent_id),
            api_url: var("VOICE_API_URL").unwrap_or(voice_defaults.api_url),
        };

        Ok(Self {
            bind_address,
            mail,
            voice,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load_from(&[]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert!(config.mail.api_key.is_none());
        assert_eq!(config.mail.to, DEFAULT_EMAIL_TO);
        assert!(config.mail.from.contains("Portfolio Contact"));
        assert_eq!(config.voice.agent_id, DEFAULT_VOICE_AGENT_ID);
    }

    #[test]
    fn test_config_overrides() {
        let config = load_from(&[
            ("BIND_ADDRESS", "127.0.0.1:8080"),
            ("RESEND_API_KEY", " re_123 "),
            ("EMAIL_FROM", "Site <site@example.com>"),
            ("EMAIL_TO", "owner@example.com"),
        ])
        .unwrap();

        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.mail.api_key.as_deref(), Some("re_123"));
        assert_eq!(config.mail.from, "Site <site@example.com>");
        assert_eq!(config.mail.to, "owner@example.com");
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = load_from(&[("EMAIL_TO", "  "), ("RESEND_API_KEY", "")]).unwrap();
        assert_eq!(config.mail.to, DEFAULT_EMAIL_TO);
        assert!(config.mail.api_key.is_none());
    }

    #[test]
    fn test_invalid_bind_address() {
        let err = load_from(&[("BIND_ADDRESS", "not-an-address")]).unwrap_err();
        assert!(err.to_string().contains("BIND_ADDRESS"));
    }
}
