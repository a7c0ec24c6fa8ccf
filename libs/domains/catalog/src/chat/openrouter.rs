use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::completion::{Backend, CompletionProvider, CompletionRequest};
use super::history::Role;
use crate::error::{CatalogError, CatalogResult};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Chat completions over an OpenAI-compatible endpoint (OpenRouter by default)
pub struct OpenRouterProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl OpenRouterProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn from_env() -> CatalogResult<Self> {
        let api_key = core_config::env_required("OPENROUTER_API_KEY")?;
        Ok(Self::new(api_key).with_base_url(core_config::env_or_default(
            "OPENROUTER_BASE_URL",
            DEFAULT_BASE_URL,
        )))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

fn chat_messages(request: &CompletionRequest) -> Vec<ChatMessage<'_>> {
    let mut messages = Vec::with_capacity(request.turns.len() + 1);
    messages.push(ChatMessage {
        role: "system",
        content: &request.system,
    });
    messages.extend(request.turns.iter().map(|turn| ChatMessage {
        role: match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: &turn.text,
    }));
    messages
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    fn backend(&self) -> Backend {
        Backend::OpenRouter
    }

    async fn complete(&self, request: &CompletionRequest) -> CatalogResult<String> {
        let body = ChatRequest {
            model: &request.model,
            messages: chat_messages(request),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(CatalogError::ProviderUnavailable(format!(
                "OpenRouter returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        Ok(parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .unwrap_or_default())
    }
}
