use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::error::{CatalogError, CatalogResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-large";

/// Configuration for any OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Requested output dimension; `None` keeps the model's native size
    pub dimensions: Option<u32>,
}

impl OpenAIConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: None,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn from_env() -> CatalogResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| CatalogError::Config("OPENAI_API_KEY not set".to_string()))?;

        Ok(Self {
            api_key,
            base_url: core_config::env_or_default("OPENAI_BASE_URL", DEFAULT_BASE_URL),
            model: core_config::env_or_default("EMBEDDING_MODEL", DEFAULT_MODEL),
            dimensions: std::env::var("EMBEDDING_DIMENSION")
                .ok()
                .and_then(|d| d.trim().parse().ok()),
        })
    }
}

/// OpenAI-compatible embeddings provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> CatalogResult<Self> {
        Ok(Self::new(OpenAIConfig::from_env()?))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn embed(&self, text: &str) -> CatalogResult<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: [text],
            dimensions: self.config.dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::EmbeddingUnavailable(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let embedding_response: EmbeddingResponse = response.json().await?;

        embedding_response
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .filter(|values| !values.is_empty())
            .ok_or_else(|| CatalogError::EmbeddingUnavailable("No embedding returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = OpenAIConfig::new("sk-test".to_string())
            .with_base_url("http://localhost:11434/v1".to_string())
            .with_model("nomic-embed-text".to_string())
            .with_dimensions(768);
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.model, "nomic-embed-text");
        assert_eq!(config.dimensions, Some(768));
    }

    #[test]
    fn test_request_serialization_skips_missing_dimensions() {
        let request = EmbeddingRequest {
            model: "text-embedding-3-large",
            input: ["giant robots"],
            dimensions: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input"][0], "giant robots");
        assert!(json.get("dimensions").is_none());
    }

    #[test]
    fn test_from_env_requires_key() {
        temp_env::with_var_unset("OPENAI_API_KEY", || {
            assert!(matches!(
                OpenAIConfig::from_env(),
                Err(CatalogError::Config(_))
            ));
        });
    }
}
