use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use super::EmbeddingProvider;

/// Outcome of an embedding request.
///
/// Provider failures never surface as errors here; callers decide how to
/// degrade when a vector is not available.
#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    Available(Vec<f32>),
    Unavailable,
}

impl Embedding {
    pub fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Embedding::Available(values) => Some(values),
            Embedding::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Embedding::Available(_))
    }
}

/// Single entry point for turning text into vectors.
///
/// Ingestion and querying share one gateway so every stored and query vector
/// comes from the same model at the same dimension.
#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    timeout: Duration,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimension: usize, timeout: Duration) -> Self {
        Self {
            provider,
            dimension,
            timeout,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    #[instrument(skip(self, text), fields(provider = self.provider.name(), chars = text.len()))]
    pub async fn embed(&self, text: &str) -> Embedding {
        let values = match tokio::time::timeout(self.timeout, self.provider.embed(text)).await {
            Ok(Ok(values)) => values,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Embedding provider failed");
                return Embedding::Unavailable;
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Embedding request timed out");
                return Embedding::Unavailable;
            }
        };

        if values.is_empty() {
            tracing::warn!("Embedding provider returned an empty vector");
            return Embedding::Unavailable;
        }

        if values.len() != self.dimension {
            tracing::warn!(
                expected = self.dimension,
                actual = values.len(),
                "Embedding dimension mismatch"
            );
            return Embedding::Unavailable;
        }

        Embedding::Available(values)
    }
}
