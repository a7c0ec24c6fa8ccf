use std::sync::Arc;
use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_duration_secs, env_or_default, env_parse};

use crate::anilist::DEFAULT_ANILIST_URL;
use crate::chat::DEFAULT_CONTEXT_SIZE;
use crate::embedding::{
    EmbeddingGateway, EmbeddingProvider, GeminiEmbeddingConfig, GeminiEmbeddingProvider,
    OpenAIConfig, OpenAIProvider,
};
use crate::error::CatalogResult;
use crate::mongodb::DEFAULT_VECTOR_INDEX;
use crate::ranking::{DEFAULT_NUM_CANDIDATES, RankingStrategy};

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 3072;
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;

/// Which embedding API backs the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EmbeddingBackend {
    #[default]
    Gemini,
    #[strum(serialize = "openai")]
    OpenAI,
}

/// Retrieval and provider settings
///
/// Environment variables:
/// - `EMBEDDING_PROVIDER` (gemini | openai, default gemini)
/// - `EMBEDDING_DIMENSION` (default 3072)
/// - `EMBEDDING_MODEL` (default gemini-embedding-001)
/// - `PROVIDER_TIMEOUT_SECS` (default 60)
/// - `RANKING_STRATEGY` (exhaustive | index, default exhaustive)
/// - `VECTOR_INDEX_NAME` (default anime_embedding_index)
/// - `VECTOR_NUM_CANDIDATES` (default 100)
/// - `CHAT_CONTEXT_SIZE` (default 15)
/// - `ANILIST_URL` (default https://graphql.anilist.co)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub embedding_backend: EmbeddingBackend,
    pub embedding_dimension: usize,
    pub embedding_model: String,
    pub provider_timeout: Duration,
    pub ranking_strategy: RankingStrategy,
    pub vector_index_name: String,
    pub vector_num_candidates: u32,
    pub chat_context_size: usize,
    pub anilist_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedding_backend: EmbeddingBackend::default(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            ranking_strategy: RankingStrategy::default(),
            vector_index_name: DEFAULT_VECTOR_INDEX.to_string(),
            vector_num_candidates: DEFAULT_NUM_CANDIDATES,
            chat_context_size: DEFAULT_CONTEXT_SIZE,
            anilist_url: DEFAULT_ANILIST_URL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Gateway over the configured embedding backend, shared by ingestion and queries
    pub fn embedding_gateway(&self) -> CatalogResult<EmbeddingGateway> {
        let dimension = u32::try_from(self.embedding_dimension).unwrap_or(u32::MAX);
        let provider: Arc<dyn EmbeddingProvider> = match self.embedding_backend {
            EmbeddingBackend::Gemini => {
                let config = GeminiEmbeddingConfig::from_env()?
                    .with_model(self.embedding_model.clone())
                    .with_output_dimensionality(dimension);
                Arc::new(GeminiEmbeddingProvider::new(config))
            }
            EmbeddingBackend::OpenAI => {
                let config = OpenAIConfig::from_env()?
                    .with_model(self.embedding_model.clone())
                    .with_dimensions(dimension);
                Arc::new(OpenAIProvider::new(config))
            }
        };

        tracing::info!(
            provider = provider.name(),
            model = %self.embedding_model,
            dimension = self.embedding_dimension,
            "Embedding gateway configured"
        );
        Ok(EmbeddingGateway::new(
            provider,
            self.embedding_dimension,
            self.provider_timeout,
        ))
    }
}

impl FromEnv for EngineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let embedding_dimension = env_parse("EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?;
        if embedding_dimension == 0 {
            return Err(ConfigError::ParseError {
                key: "EMBEDDING_DIMENSION".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            embedding_backend: env_parse("EMBEDDING_PROVIDER", EmbeddingBackend::default())?,
            embedding_dimension,
            embedding_model: env_or_default("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            provider_timeout: env_duration_secs(
                "PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            )?,
            ranking_strategy: env_parse("RANKING_STRATEGY", RankingStrategy::default())?,
            vector_index_name: env_or_default("VECTOR_INDEX_NAME", DEFAULT_VECTOR_INDEX),
            vector_num_candidates: env_parse("VECTOR_NUM_CANDIDATES", DEFAULT_NUM_CANDIDATES)?,
            chat_context_size: env_parse("CHAT_CONTEXT_SIZE", DEFAULT_CONTEXT_SIZE)?,
            anilist_url: env_or_default("ANILIST_URL", DEFAULT_ANILIST_URL),
        })
    }
}
