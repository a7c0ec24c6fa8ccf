//! Ingestion Coordinator - paginated, checkpointed catalog population
//!
//! Each page runs fetch, clean, embed and commit. The cursor only moves after
//! the page's batch insert succeeds, so a failed page is retried on the next
//! call. Commits skip ids already stored, which makes a retried page land
//! once. One coordinator per cursor is assumed.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::instrument;

use crate::anilist::{AniListMedia, CatalogSource};
use crate::embedding::EmbeddingGateway;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{CatalogEntry, CatalogItem, IngestReport, PageOutcome, normalize_title};
use crate::repository::{CatalogRepository, CursorRepository};

pub const MAX_PER_PAGE: u32 = 50;

/// Totals from a multi-page run
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    pub pages: Vec<IngestReport>,
    pub exhausted: bool,
    /// Set when the run stopped on a failing page
    pub failed_page: Option<u32>,
}

impl RunSummary {
    pub fn inserted(&self) -> usize {
        self.pages.iter().map(|p| p.inserted).sum()
    }
}

pub struct IngestionCoordinator {
    source: Arc<dyn CatalogSource>,
    repository: Arc<dyn CatalogRepository>,
    cursor: Arc<dyn CursorRepository>,
    gateway: EmbeddingGateway,
}

impl IngestionCoordinator {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        repository: Arc<dyn CatalogRepository>,
        cursor: Arc<dyn CursorRepository>,
        gateway: EmbeddingGateway,
    ) -> Self {
        Self {
            source,
            repository,
            cursor,
            gateway,
        }
    }

    /// Ingest the page the cursor points at
    #[instrument(skip(self))]
    pub async fn ingest_next_page(&self, per_page: u32) -> CatalogResult<PageOutcome> {
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(CatalogError::Validation(format!(
                "per_page must be within 1..={}",
                MAX_PER_PAGE
            )));
        }

        let page = self.cursor.load_or_create().await?.current_page;

        let media = self
            .source
            .fetch_page(page, per_page)
            .await
            .map_err(|e| page_failure(page, e))?;

        if media.is_empty() {
            tracing::info!(page, "External catalog exhausted");
            return Ok(PageOutcome::Exhausted { page });
        }

        let fetched = media.len();
        let items = join_all(media.into_iter().map(|m| self.prepare(m))).await;
        let missing_embeddings = items.iter().filter(|i| !i.has_embedding()).count();

        let inserted = self
            .repository
            .insert_many(items)
            .await
            .map_err(|e| page_failure(page, e))?;

        let next_page = page + 1;
        self.cursor
            .advance(next_page)
            .await
            .map_err(|e| page_failure(page, e))?;

        tracing::info!(page, inserted, missing_embeddings, next_page, "Page committed");
        Ok(PageOutcome::Committed(IngestReport {
            page,
            fetched,
            inserted,
            missing_embeddings,
            next_page,
        }))
    }

    /// Ingest pages until the catalog is exhausted, a page fails, or `max_pages` is reached
    #[instrument(skip(self))]
    pub async fn run_pages(
        &self,
        per_page: u32,
        max_pages: Option<u32>,
        interval: Duration,
    ) -> CatalogResult<RunSummary> {
        let mut summary = RunSummary::default();

        loop {
            if max_pages.is_some_and(|max| summary.pages.len() as u32 >= max) {
                break;
            }
            if !summary.pages.is_empty() && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }

            match self.ingest_next_page(per_page).await {
                Ok(PageOutcome::Committed(report)) => summary.pages.push(report),
                Ok(PageOutcome::Exhausted { .. }) => {
                    summary.exhausted = true;
                    break;
                }
                Err(CatalogError::IngestionPageFailure { page, reason }) => {
                    tracing::error!(page, reason = %reason, "Stopping run on failed page");
                    summary.failed_page = Some(page);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            pages = summary.pages.len(),
            inserted = summary.inserted(),
            exhausted = summary.exhausted,
            "Ingestion run finished"
        );
        Ok(summary)
    }

    /// Add a single title by name unless it is already stored
    #[instrument(skip(self))]
    pub async fn ingest_by_name(&self, name: &str) -> CatalogResult<CatalogEntry> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::Validation("name is empty".to_string()));
        }

        let requested = vec![normalize_title(name)];
        if self.repository.exists_by_titles(&requested).await? {
            return Err(CatalogError::DuplicateEntry(name.to_string()));
        }

        let media = self
            .source
            .search(name)
            .await?
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;

        if self.repository.exists_by_titles(&media.lookup_titles()).await? {
            return Err(CatalogError::DuplicateEntry(name.to_string()));
        }

        let item = self.prepare(media).await;
        if !item.has_embedding() {
            tracing::warn!(item_id = item.id, "Stored without embedding");
        }
        self.repository.insert(item.clone()).await?;

        tracing::info!(item_id = item.id, "Title added to catalog");
        Ok(CatalogEntry::from(item))
    }

    async fn prepare(&self, media: AniListMedia) -> CatalogItem {
        let embedding = self
            .gateway
            .embed(&media.embedding_source())
            .await
            .into_vector();
        media.into_item(embedding)
    }
}

fn page_failure(page: u32, err: CatalogError) -> CatalogError {
    CatalogError::IngestionPageFailure {
        page,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anilist::{MediaTitle, MockCatalogSource, Studios};
    use crate::testing::{InMemoryCatalog, InMemoryCursor, KeywordEmbedder, item, keyword_gateway};
    use std::sync::atomic::Ordering;

    fn media(id: i64, romaji: &str, english: Option<&str>) -> AniListMedia {
        AniListMedia {
            id,
            title: MediaTitle {
                romaji: Some(romaji.to_string()),
                english: english.map(str::to_string),
            },
            description: Some(format!("<p>A robot story about {}</p>", romaji)),
            genres: vec!["Mecha".to_string()],
            average_score: Some(80),
            episodes: Some(24),
            duration: Some(24),
            season: None,
            season_year: None,
            status: None,
            source: None,
            studios: Studios::Flat(vec![]),
            cover_image: None,
        }
    }

    struct Harness {
        repo: Arc<InMemoryCatalog>,
        cursor: Arc<InMemoryCursor>,
        embedder: Arc<KeywordEmbedder>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                repo: Arc::new(InMemoryCatalog::default()),
                cursor: Arc::new(InMemoryCursor::default()),
                embedder: Arc::new(KeywordEmbedder::new()),
            }
        }

        fn coordinator(&self, source: MockCatalogSource) -> IngestionCoordinator {
            IngestionCoordinator::new(
                Arc::new(source),
                self.repo.clone(),
                self.cursor.clone(),
                keyword_gateway(self.embedder.clone()),
            )
        }
    }

    #[tokio::test]
    async fn test_page_inserts_and_advances_cursor() {
        let mut source = MockCatalogSource::new();
        source
            .expect_fetch_page()
            .withf(|page, per_page| *page == 1 && *per_page == 2)
            .times(1)
            .returning(|_, _| Ok(vec![media(1, "Gundam", None), media(2, "Evangelion", None)]));

        let harness = Harness::new();
        let outcome = harness.coordinator(source).ingest_next_page(2).await.unwrap();

        let PageOutcome::Committed(report) = outcome else {
            panic!("expected committed page");
        };
        assert_eq!(report.inserted, 2);
        assert_eq!(report.next_page, 2);
        assert_eq!(harness.repo.len().await, 2);
        assert_eq!(harness.cursor.current_page().await, Some(2));
        assert_eq!(harness.embedder.call_count(), 2);
    }

    #[tokio::test]
    async fn test_stored_items_are_cleaned_and_normalized() {
        let mut source = MockCatalogSource::new();
        source
            .expect_fetch_page()
            .returning(|_, _| Ok(vec![media(7, "Mobile Suit Gundam", Some("Gundam"))]));

        let harness = Harness::new();
        harness.coordinator(source).ingest_next_page(1).await.unwrap();

        let stored = harness.repo.items.lock().await[0].clone();
        assert_eq!(stored.title.romaji.as_deref(), Some("mobile suit gundam"));
        assert_eq!(stored.title.display_romaji.as_deref(), Some("Mobile Suit Gundam"));
        assert_eq!(stored.description, "A robot story about Mobile Suit Gundam");
        assert!(stored.has_embedding());
    }

    #[tokio::test]
    async fn test_commit_failure_leaves_cursor_and_retries_same_page() {
        let mut source = MockCatalogSource::new();
        source
            .expect_fetch_page()
            .withf(|page, _| *page == 1)
            .times(2)
            .returning(|_, _| Ok(vec![media(1, "Gundam", None)]));

        let harness = Harness::new();
        harness.repo.fail_inserts.store(true, Ordering::SeqCst);
        let coordinator = harness.coordinator(source);

        let first = coordinator.ingest_next_page(1).await;
        assert!(matches!(
            first,
            Err(CatalogError::IngestionPageFailure { page: 1, .. })
        ));
        assert_eq!(harness.cursor.current_page().await, Some(1));

        harness.repo.fail_inserts.store(false, Ordering::SeqCst);
        let second = coordinator.ingest_next_page(1).await.unwrap();
        assert!(matches!(second, PageOutcome::Committed(ref r) if r.page == 1));
        assert_eq!(harness.cursor.current_page().await, Some(2));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_page_failure() {
        let mut source = MockCatalogSource::new();
        source
            .expect_fetch_page()
            .returning(|_, _| Err(CatalogError::ProviderUnavailable("AniList returned 500".into())));

        let harness = Harness::new();
        let result = harness.coordinator(source).ingest_next_page(5).await;

        assert!(matches!(
            result,
            Err(CatalogError::IngestionPageFailure { page: 1, ref reason }) if reason.contains("500")
        ));
        assert_eq!(harness.repo.len().await, 0);
    }

    #[tokio::test]
    async fn test_cursor_write_failure_retries_page_once() {
        let mut source = MockCatalogSource::new();
        source
            .expect_fetch_page()
            .withf(|page, _| *page == 1)
            .times(2)
            .returning(|_, _| Ok(vec![media(1, "Gundam", None), media(2, "Macross", None)]));

        let harness = Harness::new();
        harness.cursor.failing_advances.store(1, Ordering::SeqCst);
        let coordinator = harness.coordinator(source);

        let first = coordinator.ingest_next_page(2).await;
        assert!(matches!(
            first,
            Err(CatalogError::IngestionPageFailure { page: 1, ref reason }) if reason.contains("stepped down")
        ));
        assert_eq!(harness.cursor.current_page().await, Some(1));

        let second = coordinator.ingest_next_page(2).await.unwrap();
        let PageOutcome::Committed(report) = second else {
            panic!("expected committed page");
        };
        assert_eq!(report.page, 1);
        assert_eq!(report.inserted, 0);
        assert_eq!(harness.cursor.current_page().await, Some(2));

        let ids: Vec<i64> = harness.repo.items.lock().await.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_page_overlapping_suggested_title_commits() {
        let mut source = MockCatalogSource::new();
        source
            .expect_search()
            .returning(|_| Ok(Some(media(20, "Naruto", None))));
        source
            .expect_fetch_page()
            .returning(|_, _| Ok(vec![media(19, "Bleach", None), media(20, "Naruto", None)]));

        let harness = Harness::new();
        let coordinator = harness.coordinator(source);

        coordinator.ingest_by_name("Naruto").await.unwrap();
        let outcome = coordinator.ingest_next_page(2).await.unwrap();

        let PageOutcome::Committed(report) = outcome else {
            panic!("expected committed page");
        };
        assert_eq!(report.fetched, 2);
        assert_eq!(report.inserted, 1);
        assert_eq!(harness.repo.len().await, 2);
        assert_eq!(harness.cursor.current_page().await, Some(2));
    }

    #[tokio::test]
    async fn test_empty_page_is_exhausted() {
        let mut source = MockCatalogSource::new();
        source.expect_fetch_page().returning(|_, _| Ok(vec![]));

        let harness = Harness::new();
        let outcome = harness.coordinator(source).ingest_next_page(10).await.unwrap();

        assert_eq!(outcome, PageOutcome::Exhausted { page: 1 });
        assert_eq!(harness.cursor.current_page().await, Some(1));
    }

    #[tokio::test]
    async fn test_embedding_outage_stores_items_without_vectors() {
        let mut source = MockCatalogSource::new();
        source
            .expect_fetch_page()
            .returning(|_, _| Ok(vec![media(1, "Gundam", None), media(2, "Macross", None)]));

        let harness = Harness {
            embedder: Arc::new(KeywordEmbedder::failing()),
            ..Harness::new()
        };
        let outcome = harness.coordinator(source).ingest_next_page(2).await.unwrap();

        let PageOutcome::Committed(report) = outcome else {
            panic!("expected committed page");
        };
        assert_eq!(report.missing_embeddings, 2);
        assert_eq!(harness.repo.len().await, 2);
        assert_eq!(harness.cursor.current_page().await, Some(2));
    }

    #[tokio::test]
    async fn test_per_page_bounds() {
        let harness = Harness::new();
        let coordinator = harness.coordinator(MockCatalogSource::new());
        assert!(matches!(
            coordinator.ingest_next_page(0).await,
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            coordinator.ingest_next_page(MAX_PER_PAGE + 1).await,
            Err(CatalogError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_run_pages_stops_when_exhausted() {
        let mut source = MockCatalogSource::new();
        source.expect_fetch_page().returning(|page, _| {
            if page <= 3 {
                Ok(vec![media(i64::from(page), &format!("Show {}", page), None)])
            } else {
                Ok(vec![])
            }
        });

        let harness = Harness::new();
        let summary = harness
            .coordinator(source)
            .run_pages(1, None, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(summary.pages.len(), 3);
        assert!(summary.exhausted);
        assert_eq!(summary.inserted(), 3);
        assert_eq!(harness.cursor.current_page().await, Some(4));
    }

    #[tokio::test]
    async fn test_run_pages_respects_max_and_failures() {
        let mut source = MockCatalogSource::new();
        source.expect_fetch_page().returning(|page, _| {
            if page == 2 {
                Err(CatalogError::ProviderUnavailable("rate limited".into()))
            } else {
                Ok(vec![media(i64::from(page), &format!("Show {}", page), None)])
            }
        });

        let harness = Harness::new();
        let coordinator = harness.coordinator(source);

        let limited = coordinator.run_pages(1, Some(1), Duration::ZERO).await.unwrap();
        assert_eq!(limited.pages.len(), 1);
        assert!(!limited.exhausted);

        let failed = coordinator.run_pages(1, None, Duration::ZERO).await.unwrap();
        assert!(failed.pages.is_empty());
        assert_eq!(failed.failed_page, Some(2));
        assert_eq!(harness.cursor.current_page().await, Some(2));
    }

    #[tokio::test]
    async fn test_ingest_by_name_rejects_existing_title() {
        let mut source = MockCatalogSource::new();
        source.expect_search().times(0);

        let harness = Harness::new();
        harness
            .repo
            .items
            .lock()
            .await
            .push(item(20, "naruto", Some(vec![1.0, 0.0, 0.0, 0.0, 0.1])));

        let result = harness.coordinator(source).ingest_by_name("Naruto").await;
        assert!(matches!(result, Err(CatalogError::DuplicateEntry(_))));
        assert_eq!(harness.repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_ingest_by_name_rechecks_fetched_titles() {
        let mut source = MockCatalogSource::new();
        source
            .expect_search()
            .returning(|_| Ok(Some(media(16498, "Shingeki no Kyojin", Some("Attack on Titan")))));

        let harness = Harness::new();
        harness
            .repo
            .items
            .lock()
            .await
            .push(item(16498, "Attack on Titan", None));

        let result = harness.coordinator(source).ingest_by_name("AoT").await;
        assert!(matches!(result, Err(CatalogError::DuplicateEntry(_))));
        assert_eq!(harness.repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_ingest_by_name_inserts_new_title() {
        let mut source = MockCatalogSource::new();
        source
            .expect_search()
            .withf(|term| term == "Mushishi")
            .returning(|_| Ok(Some(media(457, "Mushishi", None))));

        let harness = Harness::new();
        let entry = harness
            .coordinator(source)
            .ingest_by_name("  Mushishi ")
            .await
            .unwrap();

        assert_eq!(entry.id, 457);
        assert_eq!(harness.repo.len().await, 1);
        assert!(harness.repo.items.lock().await[0].has_embedding());
    }

    #[tokio::test]
    async fn test_ingest_by_name_unknown_title() {
        let mut source = MockCatalogSource::new();
        source.expect_search().returning(|_| Ok(None));

        let harness = Harness::new();
        let result = harness.coordinator(source).ingest_by_name("Nonexistent").await;
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }
}
