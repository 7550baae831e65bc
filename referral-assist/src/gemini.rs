use std::time::Duration;

use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{GenerateRequest, GenerativeModel, Part, ResponseFormat};
use crate::{AssistConfig, AssistError, Credential};

/// Blocking client for the `generateContent` REST endpoint.
pub struct GeminiClient {
    endpoint: String,
    credential: Credential,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(config: &AssistConfig, credential: Credential) -> Result<Self, AssistError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AssistError::HttpClient(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            credential,
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.endpoint)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<WirePart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Inline { inline_data: InlineData },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn to_wire(request: &GenerateRequest) -> GenerateContentRequest {
    let parts = request
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => WirePart::Text { text: text.clone() },
            Part::InlineData { mime_type, data } => WirePart::Inline {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(data),
                },
            },
        })
        .collect();

    let generation_config = match &request.format {
        ResponseFormat::Text => None,
        ResponseFormat::Json(schema) => Some(GenerationConfig {
            response_mime_type: "application/json",
            response_schema: schema.clone(),
        }),
    };

    GenerateContentRequest {
        contents: vec![Content { parts }],
        generation_config,
    }
}

fn first_candidate_text(response: GenerateContentResponse) -> Result<String, AssistError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AssistError::EmptyResponse);
    }
    Ok(text)
}

impl GenerativeModel for GeminiClient {
    fn generate(&self, request: &GenerateRequest) -> Result<String, AssistError> {
        let key = self.credential.key_at(Utc::now())?;

        let response = self
            .client
            .post(self.url(&request.model))
            .header("x-goog-api-key", key)
            .json(&to_wire(request))
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    AssistError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    AssistError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AssistError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| AssistError::ResponseParsing(e.to_string()))?;

        tracing::debug!(model = %request.model, "model responded");
        first_candidate_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let config = AssistConfig {
            endpoint: "https://example.test/v1beta/".into(),
            ..AssistConfig::default()
        };
        let client = GeminiClient::new(&config, Credential::new("k")).unwrap();
        assert_eq!(
            client.url("flash"),
            "https://example.test/v1beta/models/flash:generateContent"
        );
    }

    #[test]
    fn wire_body_encodes_inline_pdf_and_schema() {
        let request = GenerateRequest {
            model: "flash".into(),
            parts: vec![
                Part::InlineData {
                    mime_type: "application/pdf".into(),
                    data: b"%PDF".to_vec(),
                },
                Part::Text("extrae".into()),
            ],
            format: ResponseFormat::Json(json!({"type": "OBJECT"})),
        };

        let body = serde_json::to_value(to_wire(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{
                    "parts": [
                        {"inlineData": {"mimeType": "application/pdf", "data": "JVBERg=="}},
                        {"text": "extrae"}
                    ]
                }],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": {"type": "OBJECT"}
                }
            })
        );
    }

    #[test]
    fn plain_text_request_has_no_generation_config() {
        let request = GenerateRequest {
            model: "flash".into(),
            parts: vec![Part::Text("hola".into())],
            format: ResponseFormat::Text,
        };
        let body = serde_json::to_value(to_wire(&request)).unwrap();
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn candidate_text_parts_are_joined() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "Hola "}, {"text": "mundo"}]}}]
        }))
        .unwrap();
        assert_eq!(first_candidate_text(response).unwrap(), "Hola mundo");
    }

    #[test]
    fn missing_candidates_are_empty() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(matches!(
            first_candidate_text(response),
            Err(AssistError::EmptyResponse)
        ));
    }

    #[test]
    fn expired_credential_fails_before_any_request() {
        let credential =
            Credential::new("k").expiring_at(Utc::now() - chrono::Duration::seconds(1));
        let client = GeminiClient::new(&AssistConfig::default(), credential).unwrap();
        let request = GenerateRequest {
            model: "flash".into(),
            parts: vec![Part::Text("hola".into())],
            format: ResponseFormat::Text,
        };
        assert!(matches!(
            client.generate(&request),
            Err(AssistError::CredentialExpired)
        ));
    }
}
