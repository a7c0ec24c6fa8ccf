//! Gemini embedding provider
//!
//! Calls `models/{model}:embedContent` on the Generative Language API with an
//! API key.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::error::{CatalogError, CatalogResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-embedding-001";

#[derive(Debug, Clone)]
pub struct GeminiEmbeddingConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// `outputDimensionality`; `None` keeps the model default (3072)
    pub output_dimensionality: Option<u32>,
}

impl GeminiEmbeddingConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            output_dimensionality: None,
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_output_dimensionality(mut self, dimension: u32) -> Self {
        self.output_dimensionality = Some(dimension);
        self
    }

    pub fn from_env() -> CatalogResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| {
                CatalogError::Config("GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string())
            })?;

        Ok(Self {
            api_key,
            base_url: core_config::env_or_default("GEMINI_BASE_URL", DEFAULT_BASE_URL),
            model: core_config::env_or_default("EMBEDDING_MODEL", DEFAULT_MODEL),
            output_dimensionality: std::env::var("EMBEDDING_DIMENSION")
                .ok()
                .and_then(|d| d.trim().parse().ok()),
        })
    }

    fn endpoint_url(&self) -> String {
        format!("{}/models/{}:embedContent", self.base_url, self.model)
    }
}

pub struct GeminiEmbeddingProvider {
    client: Client,
    config: GeminiEmbeddingConfig,
}

impl GeminiEmbeddingProvider {
    pub fn new(config: GeminiEmbeddingConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> CatalogResult<Self> {
        Ok(Self::new(GeminiEmbeddingConfig::from_env()?))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn embed(&self, text: &str) -> CatalogResult<Vec<f32>> {
        let request = EmbedContentRequest {
            content: Content {
                parts: [Part { text }],
            },
            output_dimensionality: self.config.output_dimensionality,
        };

        let response = self
            .client
            .post(self.config.endpoint_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::EmbeddingUnavailable(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbedContentResponse = response.json().await?;

        body.embedding
            .map(|e| e.values)
            .filter(|values| !values.is_empty())
            .ok_or_else(|| CatalogError::EmbeddingUnavailable("No embedding returned".to_string()))
    }
}
