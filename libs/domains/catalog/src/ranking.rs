//! Similarity ranking over catalog embeddings

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::instrument;

use crate::error::CatalogResult;
use crate::models::{CatalogItem, RankedCandidate};
use crate::repository::{CatalogRepository, VectorQuery};

/// Default candidate pool for index-assisted lookups
pub const DEFAULT_NUM_CANDIDATES: u32 = 100;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RankingStrategy {
    /// Cosine scan over every embedded item
    #[default]
    Exhaustive,
    /// Store-side nearest-neighbour index (`$vectorSearch`)
    Index,
}

/// Cosine similarity of two vectors.
///
/// `None` when the lengths differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

/// Score every item against `query` and keep the best `k`.
///
/// Items without a usable embedding are skipped. Ties on score go to the
/// lower catalog id so the order is stable for a fixed snapshot.
pub fn rank_exhaustive(
    query: &[f32],
    k: usize,
    items: impl IntoIterator<Item = CatalogItem>,
) -> Vec<RankedCandidate> {
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<RankedCandidate> = items
        .into_iter()
        .filter_map(|item| {
            let score = cosine_similarity(query, item.embedding_vector()?)?;
            Some(RankedCandidate { item, score })
        })
        .collect();

    scored.sort_by(compare_candidates);
    scored.truncate(k);
    scored
}

fn compare_candidates(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.item.id.cmp(&b.item.id))
}

/// Ranks catalog items against a query vector using the configured strategy
#[derive(Clone)]
pub struct SimilarityRanker {
    repository: Arc<dyn CatalogRepository>,
    strategy: RankingStrategy,
    num_candidates: u32,
}

impl SimilarityRanker {
    pub fn new(repository: Arc<dyn CatalogRepository>, strategy: RankingStrategy) -> Self {
        Self {
            repository,
            strategy,
            num_candidates: DEFAULT_NUM_CANDIDATES,
        }
    }

    pub fn with_num_candidates(mut self, num_candidates: u32) -> Self {
        self.num_candidates = num_candidates;
        self
    }

    /// Top `k` candidates for `query`, best first
    #[instrument(skip(self, query), fields(strategy = %self.strategy))]
    pub async fn rank(&self, query: &[f32], k: usize) -> CatalogResult<Vec<RankedCandidate>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let ranked = match self.strategy {
            RankingStrategy::Exhaustive => {
                let items = self.repository.embedded_items().await?;
                rank_exhaustive(query, k, items)
            }
            RankingStrategy::Index => {
                let limit = u32::try_from(k).unwrap_or(u32::MAX);
                let mut candidates = self
                    .repository
                    .vector_search(VectorQuery {
                        vector: query.to_vec(),
                        num_candidates: self.num_candidates.max(limit),
                        limit,
                    })
                    .await?;
                candidates.truncate(k);
                candidates
            }
        };

        tracing::debug!(returned = ranked.len(), "Ranking complete");
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockCatalogRepository;
    use crate::testing::item;
    use std::str::FromStr;

    #[test]
    fn test_cosine_symmetric_and_self_similar() {
        let a = [0.3, -1.2, 4.0, 0.5];
        let b = [1.0, 0.4, -0.2, 2.0];

        let ab = cosine_similarity(&a, &b).unwrap();
        let ba = cosine_similarity(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-6);
        assert!((cosine_similarity(&a, &a).unwrap() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_excludes_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[], &[]), None);
    }

    #[test]
    fn test_rank_exhaustive_orders_and_truncates() {
        let items = vec![
            item(1, "a", Some(vec![0.0, 1.0])),
            item(2, "b", Some(vec![1.0, 0.0])),
            item(3, "c", Some(vec![1.0, 1.0])),
            item(4, "d", None),
            item(5, "e", Some(vec![])),
        ];

        let ranked = rank_exhaustive(&[1.0, 0.0], 2, items);
        let ids: Vec<i64> = ranked.iter().map(|c| c.item.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn test_rank_exhaustive_skips_missing_and_mismatched_embeddings() {
        let items = vec![
            item(1, "a", None),
            item(2, "b", Some(vec![1.0, 0.0, 0.0])),
            item(3, "c", Some(vec![0.0, 0.0])),
            item(4, "d", Some(vec![0.5, 0.5])),
        ];

        let ranked = rank_exhaustive(&[1.0, 0.0], 10, items);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].item.id, 4);
    }

    #[test]
    fn test_rank_exhaustive_ties_break_by_id() {
        let items = vec![
            item(30, "c", Some(vec![1.0, 0.0])),
            item(10, "a", Some(vec![2.0, 0.0])),
            item(20, "b", Some(vec![3.0, 0.0])),
        ];

        let ids: Vec<i64> = rank_exhaustive(&[1.0, 0.0], 3, items)
            .into_iter()
            .map(|c| c.item.id)
            .collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn test_rank_exhaustive_zero_k() {
        let items = vec![item(1, "a", Some(vec![1.0]))];
        assert!(rank_exhaustive(&[1.0], 0, items).is_empty());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(RankingStrategy::from_str("index").unwrap(), RankingStrategy::Index);
        assert_eq!(
            RankingStrategy::from_str("Exhaustive").unwrap(),
            RankingStrategy::Exhaustive
        );
        assert!(RankingStrategy::from_str("ann").is_err());
    }

    #[tokio::test]
    async fn test_ranker_exhaustive_reads_embedded_items() {
        let mut repo = MockCatalogRepository::new();
        repo.expect_embedded_items().times(1).returning(|| {
            Ok(vec![
                item(1, "a", Some(vec![0.0, 1.0])),
                item(2, "b", Some(vec![1.0, 0.1])),
            ])
        });

        let ranker = SimilarityRanker::new(Arc::new(repo), RankingStrategy::Exhaustive);
        let ranked = ranker.rank(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].item.id, 2);
    }

    #[tokio::test]
    async fn test_ranker_index_over_fetches_candidate_pool() {
        let mut repo = MockCatalogRepository::new();
        repo.expect_vector_search()
            .withf(|q| q.num_candidates == 100 && q.limit == 3)
            .times(1)
            .returning(|_| {
                Ok((1..=5)
                    .map(|id| RankedCandidate {
                        item: item(id, "x", None),
                        score: 1.0 / id as f32,
                    })
                    .collect())
            });

        let ranker = SimilarityRanker::new(Arc::new(repo), RankingStrategy::Index);
        let ranked = ranker.rank(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(ranked.len(), 3);
    }

    #[tokio::test]
    async fn test_ranker_index_pool_grows_with_k() {
        let mut repo = MockCatalogRepository::new();
        repo.expect_vector_search()
            .withf(|q| q.num_candidates == 150 && q.limit == 150)
            .times(1)
            .returning(|_| Ok(vec![]));

        let ranker =
            SimilarityRanker::new(Arc::new(repo), RankingStrategy::Index).with_num_candidates(40);
        assert!(ranker.rank(&[1.0], 150).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ranker_zero_k_skips_store() {
        let repo = MockCatalogRepository::new();
        let ranker = SimilarityRanker::new(Arc::new(repo), RankingStrategy::Exhaustive);
        assert!(ranker.rank(&[1.0], 0).await.unwrap().is_empty());
    }
}
