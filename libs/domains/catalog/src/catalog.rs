//! Catalog Service - read-only lookups over stored items

use std::sync::Arc;

use tracing::instrument;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{CatalogEntry, normalize_title};
use crate::repository::CatalogRepository;

const MAX_PAGE_SIZE: i64 = 100;

/// Read operations. Entries never carry embeddings.
#[derive(Clone)]
pub struct CatalogService {
    repository: Arc<dyn CatalogRepository>,
}

impl CatalogService {
    pub fn new(repository: Arc<dyn CatalogRepository>) -> Self {
        Self { repository }
    }

    /// Exact lookup by romaji or english title, case-insensitive
    #[instrument(skip(self))]
    pub async fn get_by_name(&self, name: &str) -> CatalogResult<CatalogEntry> {
        self.repository
            .find_by_title(&normalize_title(name))
            .await?
            .map(CatalogEntry::from)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn list_genres(&self) -> CatalogResult<Vec<String>> {
        self.repository.list_genres().await
    }

    /// One page of items in `genre`; `page` starts at 1
    #[instrument(skip(self))]
    pub async fn filter_by_genre(
        &self,
        genre: &str,
        page: u64,
        limit: i64,
    ) -> CatalogResult<Vec<CatalogEntry>> {
        if page == 0 || !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(CatalogError::Validation(format!(
                "page must be >= 1 and limit within 1..={}",
                MAX_PAGE_SIZE
            )));
        }

        let items = self.repository.filter_by_genre(genre.trim(), page, limit).await?;
        Ok(items.into_iter().map(CatalogEntry::from).collect())
    }

    /// Substring search over titles
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str, limit: i64) -> CatalogResult<Vec<CatalogEntry>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(CatalogError::Validation("search term is empty".to_string()));
        }

        let items = self
            .repository
            .search(term, limit.clamp(1, MAX_PAGE_SIZE))
            .await?;
        Ok(items.into_iter().map(CatalogEntry::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn count(&self) -> CatalogResult<u64> {
        self.repository.count().await
    }
}
