//! Generative lookup over HTTP.
//!
//! Implements [`klaim_core::GenerativeLookup`] against a `generateContent`-style JSON API.
//! The model is asked for a single JSON object with the four resolution fields; this crate
//! only transports and unwraps it. Schema validation stays in the core resolver.
//!
//! Every failure, including a timeout, surfaces as a [`ResolutionError`].

use klaim_core::{DiagnosisCode, GeneratedPayload, GenerativeLookup, ResolutionError};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Errors raised while talking to the generative service.
#[derive(Debug, thiserror::Error)]
pub enum GenAiError {
    #[error("generative lookup is not configured (no API key)")]
    NotConfigured,
    #[error("request timed out")]
    Timeout,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("service returned no candidate text")]
    EmptyResponse,
    #[error("candidate text is not a JSON object: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub type GenAiResult<T> = Result<T, GenAiError>;

/// Connection settings for the generative service.
#[derive(Clone, Debug)]
pub struct GenAiConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl GenAiConfig {
    /// Builds a config from optional raw values, falling back to the defaults.
    ///
    /// Blank values count as unset.
    pub fn from_values(
        endpoint: Option<String>,
        model: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        fn non_blank(v: Option<String>) -> Option<String> {
            v.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }

        Self {
            endpoint: non_blank(endpoint)
                .unwrap_or_else(|| DEFAULT_ENDPOINT.into())
                .trim_end_matches('/')
                .to_string(),
            model: non_blank(model).unwrap_or_else(|| DEFAULT_MODEL.into()),
            api_key: non_blank(api_key),
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

/// Builds the instruction sent to the model for one code.
pub fn build_prompt(code: &DiagnosisCode, hint: Option<&str>) -> String {
    let mut prompt = format!(
        "You are assisting hospital claim verifiers with Indonesian INA-CBG (BPJS Kesehatan) claims.\n\
         Describe ICD-10 diagnosis code {code}.\n"
    );
    if let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) {
        prompt.push_str(&format!("Clinical context from the verifier: {hint}\n"));
    }
    prompt.push_str(
        "Respond with one JSON object with exactly these fields:\n\
         - \"code\": the ICD-10 code\n\
         - \"description\": the official diagnosis description\n\
         - \"severity\": the INA-CBG severity level, one of \"I\", \"II\", \"III\"\n\
         - \"requiredDocuments\": the list of documents required to submit the claim \
         (for example SEP, Resume Medis, supporting examination results)\n",
    );
    prompt
}

fn request_body(prompt: &str) -> serde_json::Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "code": { "type": "STRING" },
                    "description": { "type": "STRING" },
                    "severity": { "type": "STRING", "enum": ["I", "II", "III"] },
                    "requiredDocuments": { "type": "ARRAY", "items": { "type": "STRING" } }
                },
                "required": ["code", "description", "severity", "requiredDocuments"]
            }
        }
    })
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Pulls the resolution payload out of a raw `generateContent` response body.
///
/// Models occasionally wrap JSON in a Markdown code fence; the fence is removed.
pub fn extract_payload(response_body: &str) -> GenAiResult<GeneratedPayload> {
    let response: GenerateResponse = serde_json::from_str(response_body)?;

    let text = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text.filter(|t| !t.trim().is_empty()))
        .ok_or(GenAiError::EmptyResponse)?;

    let json_text = strip_code_fence(&text);
    Ok(serde_json::from_str(json_text)?)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// [`GenerativeLookup`] backed by an HTTP generative service.
#[derive(Clone, Debug)]
pub struct HttpGenerativeLookup {
    cfg: GenAiConfig,
    client: reqwest::Client,
}

impl HttpGenerativeLookup {
    /// # Errors
    ///
    /// Returns [`GenAiError::Http`] if the HTTP client cannot be built.
    pub fn new(cfg: GenAiConfig) -> GenAiResult<Self> {
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self { cfg, client })
    }

    pub fn config(&self) -> &GenAiConfig {
        &self.cfg
    }

    async fn call(&self, code: &DiagnosisCode, hint: Option<&str>) -> GenAiResult<GeneratedPayload> {
        let api_key = self.cfg.api_key.as_deref().ok_or(GenAiError::NotConfigured)?;

        let response = self
            .client
            .post(self.cfg.url())
            .header("x-goog-api-key", api_key)
            .json(&request_body(&build_prompt(code, hint)))
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body = response.text().await.map_err(classify)?;
        if !status.is_success() {
            return Err(GenAiError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        extract_payload(&body)
    }

    fn to_resolution_error(&self, err: GenAiError) -> ResolutionError {
        match err {
            GenAiError::Timeout => ResolutionError::Timeout(self.cfg.timeout),
            other => ResolutionError::Lookup(other.to_string()),
        }
    }
}

fn classify(err: reqwest::Error) -> GenAiError {
    if err.is_timeout() {
        GenAiError::Timeout
    } else {
        GenAiError::Http(err)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

impl GenerativeLookup for HttpGenerativeLookup {
    async fn generate(
        &self,
        code: &DiagnosisCode,
        hint: Option<&str>,
    ) -> Result<GeneratedPayload, ResolutionError> {
        tracing::info!("requesting generative lookup for {} from {}", code, self.cfg.model);
        self.call(code, hint)
            .await
            .map_err(|e| self.to_resolution_error(e))
    }
}
