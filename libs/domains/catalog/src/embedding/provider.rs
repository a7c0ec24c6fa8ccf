use async_trait::async_trait;

use crate::error::CatalogResult;

/// Trait for embedding generation providers
///
/// Implementations return `Err` for transport failures, non-success responses
/// and empty result sets. Retry and timeout policy belong to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Embed a single text
    async fn embed(&self, text: &str) -> CatalogResult<Vec<f32>>;
}
