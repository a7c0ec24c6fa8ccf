//! In-memory fakes shared by the unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::embedding::{EmbeddingGateway, EmbeddingProvider};
use crate::error::{CatalogError, CatalogResult};
use crate::models::{CatalogItem, IngestionCursor, RankedCandidate, Title};
use crate::ranking::rank_exhaustive;
use crate::repository::{CatalogRepository, CursorRepository, VectorQuery};

pub const KEYWORDS: [&str; 4] = ["robot", "magic", "school", "sport"];

pub fn item(id: i64, title: &str, embedding: Option<Vec<f32>>) -> CatalogItem {
    CatalogItem {
        id,
        title: Title::from_display(Some(title.to_string()), None),
        description: format!("About {}", title),
        genres: vec!["Action".to_string()],
        average_score: Some(70),
        episodes: Some(12),
        duration: Some(24),
        season: None,
        season_year: None,
        status: None,
        source: None,
        studios: vec![],
        cover_image: None,
        embedding,
    }
}

/// Deterministic embedding: one axis per keyword plus a bias axis
pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut vector: Vec<f32> = KEYWORDS
        .iter()
        .map(|k| lower.matches(k).count() as f32)
        .collect();
    vector.push(0.1);
    vector
}

pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        let embedder = Self::new();
        embedder.fail.store(true, Ordering::SeqCst);
        embedder
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn embed(&self, text: &str) -> CatalogResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CatalogError::ProviderUnavailable("embedder offline".into()));
        }
        Ok(keyword_vector(text))
    }
}

pub fn keyword_gateway(embedder: Arc<KeywordEmbedder>) -> EmbeddingGateway {
    EmbeddingGateway::new(embedder, KEYWORDS.len() + 1, Duration::from_secs(5))
}

/// Catalog store backed by a vector
#[derive(Default)]
pub struct InMemoryCatalog {
    pub items: Mutex<Vec<CatalogItem>>,
    pub fail_inserts: AtomicBool,
}

impl InMemoryCatalog {
    pub fn with_items(items: Vec<CatalogItem>) -> Self {
        Self {
            items: Mutex::new(items),
            fail_inserts: AtomicBool::new(false),
        }
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn find_by_title(&self, title: &str) -> CatalogResult<Option<CatalogItem>> {
        let items = self.items.lock().await;
        Ok(items
            .iter()
            .find(|i| i.title.lookup_keys().iter().any(|k| k == title))
            .cloned())
    }

    async fn exists_by_titles(&self, titles: &[String]) -> CatalogResult<bool> {
        let items = self.items.lock().await;
        Ok(items
            .iter()
            .any(|i| i.title.lookup_keys().iter().any(|k| titles.contains(k))))
    }

    async fn embedded_items(&self) -> CatalogResult<Vec<CatalogItem>> {
        let mut items: Vec<CatalogItem> = self
            .items
            .lock()
            .await
            .iter()
            .filter(|i| i.has_embedding())
            .cloned()
            .collect();
        items.sort_by_key(|i| i.id);
        Ok(items)
    }

    async fn vector_search(&self, query: VectorQuery) -> CatalogResult<Vec<RankedCandidate>> {
        let items = self.embedded_items().await?;
        Ok(rank_exhaustive(&query.vector, query.limit as usize, items))
    }

    async fn insert(&self, item: CatalogItem) -> CatalogResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(CatalogError::Database("write rejected".into()));
        }
        let mut items = self.items.lock().await;
        if items.iter().any(|i| i.id == item.id) {
            return Err(CatalogError::DuplicateEntry(item.id.to_string()));
        }
        items.push(item);
        Ok(())
    }

    async fn insert_many(&self, new_items: Vec<CatalogItem>) -> CatalogResult<usize> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(CatalogError::Database("write rejected".into()));
        }
        let mut items = self.items.lock().await;
        let mut stored = 0;
        for item in new_items {
            if items.iter().all(|i| i.id != item.id) {
                items.push(item);
                stored += 1;
            }
        }
        Ok(stored)
    }

    async fn count(&self) -> CatalogResult<u64> {
        Ok(self.items.lock().await.len() as u64)
    }

    async fn list_genres(&self) -> CatalogResult<Vec<String>> {
        let mut genres: Vec<String> = self
            .items
            .lock()
            .await
            .iter()
            .flat_map(|i| i.genres.clone())
            .collect();
        genres.sort();
        genres.dedup();
        Ok(genres)
    }

    async fn filter_by_genre(
        &self,
        genre: &str,
        page: u64,
        limit: i64,
    ) -> CatalogResult<Vec<CatalogItem>> {
        let limit = limit.max(0) as usize;
        let skip = page.saturating_sub(1) as usize * limit;
        let mut matching: Vec<CatalogItem> = self
            .items
            .lock()
            .await
            .iter()
            .filter(|i| i.genres.iter().any(|g| g == genre))
            .cloned()
            .collect();
        matching.sort_by_key(|i| i.id);
        Ok(matching.into_iter().skip(skip).take(limit).collect())
    }

    async fn search(&self, term: &str, limit: i64) -> CatalogResult<Vec<CatalogItem>> {
        let needle = term.trim().to_lowercase();
        let items = self.items.lock().await;
        Ok(items
            .iter()
            .filter(|i| i.title.lookup_keys().iter().any(|k| k.contains(&needle)))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

/// Cursor store that records every advance
#[derive(Default)]
pub struct InMemoryCursor {
    pub cursor: Mutex<Option<IngestionCursor>>,
    /// Number of upcoming `advance` calls that fail before any succeeds
    pub failing_advances: AtomicUsize,
}

impl InMemoryCursor {
    pub async fn current_page(&self) -> Option<u32> {
        self.cursor.lock().await.as_ref().map(|c| c.current_page)
    }
}

#[async_trait]
impl CursorRepository for InMemoryCursor {
    async fn load(&self) -> CatalogResult<Option<IngestionCursor>> {
        Ok(self.cursor.lock().await.clone())
    }

    async fn load_or_create(&self) -> CatalogResult<IngestionCursor> {
        let mut cursor = self.cursor.lock().await;
        Ok(cursor.get_or_insert_with(IngestionCursor::default).clone())
    }

    async fn advance(&self, next_page: u32) -> CatalogResult<()> {
        let failing = self
            .failing_advances
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(CatalogError::Database("primary stepped down".into()));
        }
        let mut cursor = self.cursor.lock().await;
        cursor.get_or_insert_with(IngestionCursor::default).current_page = next_page;
        Ok(())
    }
}
