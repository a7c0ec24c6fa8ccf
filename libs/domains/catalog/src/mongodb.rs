//! MongoDB implementation of CatalogRepository and CursorRepository

use std::collections::HashSet;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Collection, Database, IndexModel,
    bson::{Bson, Document, doc, from_document},
    error::{ErrorKind, InsertManyError, WriteFailure},
    options::IndexOptions,
};
use tracing::instrument;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{CURSOR_ID, CatalogItem, IngestionCursor, RankedCandidate};
use crate::repository::{CatalogRepository, CursorRepository, VectorQuery};

pub const CATALOG_COLLECTION: &str = "animes";
pub const CURSOR_COLLECTION: &str = "status";
pub const DEFAULT_VECTOR_INDEX: &str = "anime_embedding_index";

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => command.code == DUPLICATE_KEY,
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Number of rejected documents when every rejection of an unordered
/// `insert_many` is a duplicate key
fn duplicate_rejections(err: &mongodb::error::Error) -> Option<usize> {
    match err.kind.as_ref() {
        ErrorKind::InsertMany(InsertManyError {
            write_errors: Some(errors),
            write_concern_error: None,
            ..
        }) if errors.iter().all(|e| e.code == DUPLICATE_KEY) => Some(errors.len()),
        _ => None,
    }
}

/// MongoDB implementation of the CatalogRepository
pub struct MongoCatalogRepository {
    collection: Collection<CatalogItem>,
    vector_index: String,
}

impl MongoCatalogRepository {
    /// Create a repository over the `animes` collection
    ///
    /// # Example
    /// ```ignore
    /// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
    /// let repo = MongoCatalogRepository::new(&client.database("anime_db"));
    /// ```
    pub fn new(db: &Database) -> Self {
        Self::with_collection(db, CATALOG_COLLECTION)
    }

    pub fn with_collection(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection::<CatalogItem>(collection_name),
            vector_index: DEFAULT_VECTOR_INDEX.to_string(),
        }
    }

    /// Name of the Atlas vector index used by `$vectorSearch`
    pub fn with_vector_index(mut self, index_name: impl Into<String>) -> Self {
        self.vector_index = index_name.into();
        self
    }

    /// Create the lookup indexes. The vector index itself is managed in Atlas.
    ///
    /// Collections that already hold duplicate ids keep working without the
    /// unique id index; page commits skip stored ids either way.
    pub async fn init_indexes(&self) -> CatalogResult<()> {
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "title.romaji": 1 })
                .options(
                    IndexOptions::builder()
                        .name("idx_title_romaji".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "title.english": 1 })
                .options(
                    IndexOptions::builder()
                        .name("idx_title_english".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "genres": 1 })
                .options(
                    IndexOptions::builder()
                        .name("idx_genres".to_string())
                        .build(),
                )
                .build(),
        ];

        self.collection.create_indexes(indexes).await?;

        let unique_id = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("idx_id_unique".to_string())
                    .build(),
            )
            .build();
        match self.collection.create_index(unique_id).await {
            Ok(_) => {}
            Err(e) if is_duplicate_key(&e) => {
                tracing::warn!(error = %e, "Duplicate ids stored; unique id index not created");
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Catalog indexes created successfully");
        Ok(())
    }

    /// Ids from `ids` that are already stored
    async fn stored_ids(&self, ids: Vec<i64>) -> CatalogResult<Vec<i64>> {
        let values = self
            .collection
            .distinct("id", doc! { "id": { "$in": ids } })
            .await?;

        Ok(values
            .into_iter()
            .filter_map(|v| match v {
                Bson::Int64(id) => Some(id),
                Bson::Int32(id) => Some(i64::from(id)),
                _ => None,
            })
            .collect())
    }

    fn title_filter(titles: &[String]) -> Document {
        doc! {
            "$or": [
                { "title.romaji": { "$in": titles } },
                { "title.english": { "$in": titles } },
            ]
        }
    }

    fn has_embedding_filter() -> Document {
        doc! { "embedding.0": { "$exists": true } }
    }

    fn vector_search_pipeline(&self, query: &VectorQuery) -> Vec<Document> {
        vec![
            doc! {
                "$vectorSearch": {
                    "index": self.vector_index.as_str(),
                    "path": "embedding",
                    "queryVector": query.vector.iter().map(|v| f64::from(*v)).collect::<Vec<_>>(),
                    "numCandidates": i64::from(query.num_candidates),
                    "limit": i64::from(query.limit),
                }
            },
            doc! { "$set": { "score": { "$meta": "vectorSearchScore" } } },
            doc! { "$unset": ["_id", "embedding"] },
        ]
    }
}

#[async_trait]
impl CatalogRepository for MongoCatalogRepository {
    #[instrument(skip(self))]
    async fn find_by_title(&self, title: &str) -> CatalogResult<Option<CatalogItem>> {
        let filter = Self::title_filter(&[title.to_string()]);
        let item = self.collection.find_one(filter).await?;
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn exists_by_titles(&self, titles: &[String]) -> CatalogResult<bool> {
        if titles.is_empty() {
            return Ok(false);
        }
        let count = self
            .collection
            .count_documents(Self::title_filter(titles))
            .limit(1)
            .await?;
        Ok(count > 0)
    }

    #[instrument(skip(self))]
    async fn embedded_items(&self) -> CatalogResult<Vec<CatalogItem>> {
        let cursor = self
            .collection
            .find(Self::has_embedding_filter())
            .sort(doc! { "id": 1 })
            .await?;
        let items: Vec<CatalogItem> = cursor.try_collect().await?;

        tracing::debug!(count = items.len(), "Loaded embedded catalog items");
        Ok(items)
    }

    #[instrument(skip(self, query), fields(num_candidates = query.num_candidates, limit = query.limit))]
    async fn vector_search(&self, query: VectorQuery) -> CatalogResult<Vec<RankedCandidate>> {
        let cursor = self
            .collection
            .aggregate(self.vector_search_pipeline(&query))
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;

        let mut candidates = Vec::with_capacity(documents.len());
        for document in documents {
            let score = document.get_f64("score").unwrap_or_default() as f32;
            let item: CatalogItem = from_document(document)?;
            candidates.push(RankedCandidate { item, score });
        }

        Ok(candidates)
    }

    #[instrument(skip(self, item), fields(item_id = item.id))]
    async fn insert(&self, item: CatalogItem) -> CatalogResult<()> {
        match self.collection.insert_one(&item).await {
            Ok(_) => {}
            Err(e) if is_duplicate_key(&e) => {
                return Err(CatalogError::DuplicateEntry(item.id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(item_id = item.id, "Catalog item inserted");
        Ok(())
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn insert_many(&self, items: Vec<CatalogItem>) -> CatalogResult<usize> {
        let stored = self.stored_ids(items.iter().map(|i| i.id).collect()).await?;
        let mut seen = HashSet::new();
        let fresh: Vec<CatalogItem> = items
            .into_iter()
            .filter(|i| !stored.contains(&i.id) && seen.insert(i.id))
            .collect();

        if !stored.is_empty() {
            tracing::debug!(skipped = stored.len(), "Skipping already stored items");
        }
        if fresh.is_empty() {
            return Ok(0);
        }

        // Unordered so a concurrent writer's duplicate only rejects that one document
        match self.collection.insert_many(&fresh).ordered(false).await {
            Ok(result) => Ok(result.inserted_ids.len()),
            Err(e) => match duplicate_rejections(&e) {
                Some(rejected) => Ok(fresh.len() - rejected),
                None => Err(e.into()),
            },
        }
    }

    #[instrument(skip(self))]
    async fn count(&self) -> CatalogResult<u64> {
        let count = self.collection.count_documents(doc! {}).await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn list_genres(&self) -> CatalogResult<Vec<String>> {
        let values = self.collection.distinct("genres", doc! {}).await?;

        let mut genres: Vec<String> = values
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        genres.sort();
        genres.dedup();
        Ok(genres)
    }

    #[instrument(skip(self))]
    async fn filter_by_genre(
        &self,
        genre: &str,
        page: u64,
        limit: i64,
    ) -> CatalogResult<Vec<CatalogItem>> {
        let skip = page.saturating_sub(1) * limit.max(0) as u64;

        let cursor = self
            .collection
            .find(doc! { "genres": genre })
            .projection(doc! { "embedding": 0 })
            .sort(doc! { "id": 1 })
            .skip(skip)
            .limit(limit)
            .await?;
        let items: Vec<CatalogItem> = cursor.try_collect().await?;

        Ok(items)
    }

    #[instrument(skip(self))]
    async fn search(&self, term: &str, limit: i64) -> CatalogResult<Vec<CatalogItem>> {
        let pattern = regex::escape(term.trim());
        let filter = doc! {
            "$or": [
                { "title.romaji": { "$regex": pattern.as_str(), "$options": "i" } },
                { "title.english": { "$regex": pattern.as_str(), "$options": "i" } },
            ]
        };

        let cursor = self
            .collection
            .find(filter)
            .projection(doc! { "embedding": 0 })
            .sort(doc! { "id": 1 })
            .limit(limit)
            .await?;
        let items: Vec<CatalogItem> = cursor.try_collect().await?;

        Ok(items)
    }
}

/// MongoDB implementation of the CursorRepository
///
/// Assumes a single ingestion coordinator; concurrent coordinators need an
/// external lease.
pub struct MongoCursorRepository {
    collection: Collection<IngestionCursor>,
}

impl MongoCursorRepository {
    pub fn new(db: &Database) -> Self {
        Self::with_collection(db, CURSOR_COLLECTION)
    }

    pub fn with_collection(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection::<IngestionCursor>(collection_name),
        }
    }
}

#[async_trait]
impl CursorRepository for MongoCursorRepository {
    #[instrument(skip(self))]
    async fn load(&self) -> CatalogResult<Option<IngestionCursor>> {
        let cursor = self.collection.find_one(doc! { "_id": CURSOR_ID }).await?;
        Ok(cursor)
    }

    #[instrument(skip(self))]
    async fn load_or_create(&self) -> CatalogResult<IngestionCursor> {
        if let Some(cursor) = self.load().await? {
            return Ok(cursor);
        }

        self.collection
            .update_one(
                doc! { "_id": CURSOR_ID },
                doc! { "$setOnInsert": { "current_page": 1_i64 } },
            )
            .upsert(true)
            .await?;

        tracing::info!("Ingestion cursor created at page 1");
        Ok(IngestionCursor::default())
    }

    #[instrument(skip(self))]
    async fn advance(&self, next_page: u32) -> CatalogResult<()> {
        self.collection
            .update_one(
                doc! { "_id": CURSOR_ID },
                doc! { "$set": { "current_page": i64::from(next_page) } },
            )
            .upsert(true)
            .await?;

        tracing::info!(next_page, "Ingestion cursor advanced");
        Ok(())
    }
}
