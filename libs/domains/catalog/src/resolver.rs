//! Recommendation Resolver - turns a query mode into a query vector and ranks

use std::sync::Arc;

use tracing::instrument;
use validator::Validate;

use crate::embedding::{Embedding, EmbeddingGateway};
use crate::error::{CatalogError, CatalogResult};
use crate::models::{CatalogEntry, QueryMode, RecommendationRequest, normalize_title};
use crate::ranking::SimilarityRanker;
use crate::repository::CatalogRepository;
use crate::text::genre_query;

pub struct RecommendationResolver {
    repository: Arc<dyn CatalogRepository>,
    gateway: EmbeddingGateway,
    ranker: SimilarityRanker,
}

impl RecommendationResolver {
    pub fn new(
        repository: Arc<dyn CatalogRepository>,
        gateway: EmbeddingGateway,
        ranker: SimilarityRanker,
    ) -> Self {
        Self {
            repository,
            gateway,
            ranker,
        }
    }

    /// Rank catalog entries for a query.
    ///
    /// In `anime_name` mode the named title is left out of its own results.
    #[instrument(skip(self, request), fields(mode = %request.mode, top_k = request.top_k))]
    pub async fn recommend(&self, request: RecommendationRequest) -> CatalogResult<Vec<CatalogEntry>> {
        let request = RecommendationRequest::new(request.query, request.mode, request.top_k);
        request.validate()?;

        let (vector, exclude_id) = self.query_vector(&request).await?;

        let fetch = request.top_k + usize::from(exclude_id.is_some());
        let entries: Vec<CatalogEntry> = self
            .ranker
            .rank(&vector, fetch)
            .await?
            .into_iter()
            .filter(|candidate| Some(candidate.item.id) != exclude_id)
            .take(request.top_k)
            .map(|candidate| CatalogEntry::from(candidate.item))
            .collect();

        if entries.is_empty() {
            return Err(CatalogError::NoMatches);
        }

        tracing::info!(returned = entries.len(), "Recommendations resolved");
        Ok(entries)
    }

    async fn query_vector(&self, request: &RecommendationRequest) -> CatalogResult<(Vec<f32>, Option<i64>)> {
        match request.mode {
            QueryMode::AnimeName => {
                let item = self
                    .repository
                    .find_by_title(&normalize_title(&request.query))
                    .await?
                    .ok_or_else(|| CatalogError::NotFound(request.query.clone()))?;

                let id = item.id;
                let vector = item
                    .embedding
                    .filter(|v| v.len() == self.gateway.dimension())
                    .ok_or_else(|| {
                        CatalogError::EmbeddingUnavailable(format!(
                            "'{}' has no stored embedding of dimension {}",
                            request.query,
                            self.gateway.dimension()
                        ))
                    })?;
                Ok((vector, Some(id)))
            }
            QueryMode::Genre => self.embed(&genre_query(&request.query)).await.map(|v| (v, None)),
            QueryMode::Description => self.embed(&request.query).await.map(|v| (v, None)),
        }
    }

    async fn embed(&self, text: &str) -> CatalogResult<Vec<f32>> {
        match self.gateway.embed(text).await {
            Embedding::Available(vector) => Ok(vector),
            Embedding::Unavailable => Err(CatalogError::EmbeddingUnavailable(format!(
                "{} could not embed the query",
                self.gateway.provider_name()
            ))),
        }
    }
}
