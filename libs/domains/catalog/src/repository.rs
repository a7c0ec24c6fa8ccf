use async_trait::async_trait;

use crate::error::CatalogResult;
use crate::models::{CatalogItem, IngestionCursor, RankedCandidate};

/// Parameters for an index-assisted nearest-neighbour lookup
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    /// Candidate pool the index considers before trimming to `limit`
    pub num_candidates: u32,
    pub limit: u32,
}

/// Repository trait for catalog persistence
///
/// Title lookups take an already normalized (trimmed, lowercase) title.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Find an item whose romaji or english lookup title equals `title`
    async fn find_by_title(&self, title: &str) -> CatalogResult<Option<CatalogItem>>;

    /// Check whether any of the normalized titles is already stored
    async fn exists_by_titles(&self, titles: &[String]) -> CatalogResult<bool>;

    /// Every item carrying a non-empty embedding, ordered by id
    async fn embedded_items(&self) -> CatalogResult<Vec<CatalogItem>>;

    /// Nearest neighbours from the store's vector index, best first
    async fn vector_search(&self, query: VectorQuery) -> CatalogResult<Vec<RankedCandidate>>;

    /// Insert one item; an already stored id is `DuplicateEntry`
    async fn insert(&self, item: CatalogItem) -> CatalogResult<()>;

    /// Store a page of items as one commit, keyed by id.
    ///
    /// Items whose id is already stored are skipped, so committing the same
    /// page twice stores it once. Returns the number of newly stored items.
    async fn insert_many(&self, items: Vec<CatalogItem>) -> CatalogResult<usize>;

    /// Count all items
    async fn count(&self) -> CatalogResult<u64>;

    /// Distinct genres, sorted
    async fn list_genres(&self) -> CatalogResult<Vec<String>>;

    /// Items tagged with `genre`, ordered by id; `page` is 1-based
    async fn filter_by_genre(
        &self,
        genre: &str,
        page: u64,
        limit: i64,
    ) -> CatalogResult<Vec<CatalogItem>>;

    /// Items whose title contains `term`, case-insensitive
    async fn search(&self, term: &str, limit: i64) -> CatalogResult<Vec<CatalogItem>>;
}

/// Persistence for the singleton ingestion checkpoint
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CursorRepository: Send + Sync {
    /// Read the cursor without creating it
    async fn load(&self) -> CatalogResult<Option<IngestionCursor>>;

    /// Read the cursor, creating it at page 1 when absent
    async fn load_or_create(&self) -> CatalogResult<IngestionCursor>;

    /// Record `next_page` as the page to fetch next
    async fn advance(&self, next_page: u32) -> CatalogResult<()>;
}
