//! Gemini `generateContent` completion provider
//!
//! Gemini names the assistant role `model`; the translation happens here.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::completion::{Backend, CompletionProvider, CompletionRequest};
use super::history::Role;
use crate::error::{CatalogError, CatalogResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiChatProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl GeminiChatProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    pub fn from_env() -> CatalogResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| {
                CatalogError::Config("GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string())
            })?;
        let mut provider = Self::new(api_key);
        provider.base_url = core_config::env_or_default("GEMINI_BASE_URL", DEFAULT_BASE_URL);
        Ok(provider)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

fn request_body(request: &CompletionRequest) -> GenerateContentRequest<'_> {
    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: &request.system,
            }],
        },
        contents: request
            .turns
            .iter()
            .map(|turn| Content {
                role: Some(gemini_role(turn.role)),
                parts: vec![Part { text: &turn.text }],
            })
            .collect(),
    }
}

#[async_trait]
impl CompletionProvider for GeminiChatProvider {
    fn backend(&self) -> Backend {
        Backend::Gemini
    }

    async fn complete(&self, request: &CompletionRequest) -> CatalogResult<String> {
        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, request.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CatalogError::ProviderUnavailable(format!(
                "Gemini returned {}: {}",
                status, text
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(text)
    }
}
