//! Generative-AI helpers for the referral tracker: document field
//! extraction, place geocoding and referral-pattern summaries.
//!
//! Every operation degrades to a fallback value when the model fails; callers
//! never have to handle a model error to keep their flow going.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod assistant;
mod gemini;
mod model;

pub use assistant::{insights_prompt, parse_coordinates, parse_extracted_fields, Assistant};
pub use gemini::GeminiClient;
pub use model::{GenerateRequest, GenerativeModel, MockModel, Part, ResponseFormat};

/// Endpoint and model selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistConfig {
    pub endpoint: String,
    pub text_model: String,
    pub geocode_model: String,
    pub timeout_secs: u64,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_model: "gemini-3-flash-preview".to_string(),
            geocode_model: "gemini-3-flash-preview".to_string(),
            timeout_secs: 60,
        }
    }
}

/// API credential handed explicitly to a client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    api_key: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            expires_at: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// The key, if still usable at `now`.
    pub fn key_at(&self, now: DateTime<Utc>) -> Result<&str, AssistError> {
        if self.api_key.is_empty() {
            return Err(AssistError::MissingCredential);
        }
        if self.is_expired_at(now) {
            return Err(AssistError::CredentialExpired);
        }
        Ok(&self.api_key)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("No API key configured")]
    MissingCredential,
    #[error("API credential has expired")]
    CredentialExpired,
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("Model API returned error (status {status}): {body}")]
    Api { status: u16, body: String },
    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
    #[error("Model returned no text")]
    EmptyResponse,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn credential_without_expiry_stays_valid() {
        let credential = Credential::new("k");
        assert_eq!(credential.key_at(Utc::now()).unwrap(), "k");
    }

    #[test]
    fn expired_credential_is_refused() {
        let now = Utc::now();
        let credential = Credential::new("k").expiring_at(now - Duration::minutes(1));
        assert!(credential.is_expired_at(now));
        assert!(matches!(
            credential.key_at(now),
            Err(AssistError::CredentialExpired)
        ));

        let fresh = Credential::new("k").expiring_at(now + Duration::hours(1));
        assert!(fresh.key_at(now).is_ok());
    }

    #[test]
    fn empty_key_is_missing() {
        assert!(matches!(
            Credential::new("").key_at(Utc::now()),
            Err(AssistError::MissingCredential)
        ));
    }

    #[test]
    fn debug_output_hides_key() {
        let rendered = format!("{:?}", Credential::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }
}
