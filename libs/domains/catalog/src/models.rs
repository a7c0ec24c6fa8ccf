use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use strum::{Display, EnumString};
use validator::Validate;

/// Identifier of the singleton ingestion cursor document.
pub const CURSOR_ID: &str = "anime_fetch_status";

/// Upper bound accepted for `top_k`.
pub const MAX_TOP_K: usize = 50;

/// Lenient field decoding: a present but malformed value reads as absent
/// instead of failing the whole document.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Like [`lenient`], resolving absent values to `T::default()`.
pub(crate) fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    lenient(deserializer).map(Option::unwrap_or_default)
}

/// AniList airing status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Finished,
    Releasing,
    NotYetReleased,
    Cancelled,
    Hiatus,
}

/// Title variants: lowercase lookup keys plus original-case display strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Title {
    #[serde(default, deserialize_with = "lenient")]
    pub romaji: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub english: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub display_romaji: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub display_english: Option<String>,
}

impl Title {
    /// Build from provider-cased titles, deriving the normalized lookup keys.
    pub fn from_display(romaji: Option<String>, english: Option<String>) -> Self {
        let romaji = romaji.filter(|t| !t.trim().is_empty());
        let english = english.filter(|t| !t.trim().is_empty());
        Self {
            romaji: romaji.as_deref().map(normalize_title),
            english: english.as_deref().map(normalize_title),
            display_romaji: romaji,
            display_english: english,
        }
    }

    /// Normalized keys used for duplicate detection and name lookup.
    pub fn lookup_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = [&self.romaji, &self.english]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        keys.dedup();
        keys
    }

    /// Case-insensitive exact match against either lookup key.
    pub fn matches(&self, name: &str) -> bool {
        let needle = normalize_title(name);
        self.lookup_keys().iter().any(|key| *key == needle)
    }

    /// Preferred human-facing name: english, then romaji.
    pub fn display_name(&self) -> &str {
        self.display_english
            .as_deref()
            .or(self.display_romaji.as_deref())
            .or(self.english.as_deref())
            .or(self.romaji.as_deref())
            .unwrap_or("Untitled")
    }
}

/// Normalized form of a title used for lookups.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverImage {
    #[serde(default, deserialize_with = "lenient")]
    pub large: Option<String>,
}

/// A catalog document as persisted in the `animes` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    /// AniList media id
    pub id: i64,
    #[serde(default)]
    pub title: Title,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub genres: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub average_score: Option<i32>,
    #[serde(default, deserialize_with = "lenient")]
    pub episodes: Option<i32>,
    /// Minutes per episode
    #[serde(default, deserialize_with = "lenient")]
    pub duration: Option<i32>,
    #[serde(default, deserialize_with = "lenient")]
    pub season: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub season_year: Option<i32>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<MediaStatus>,
    #[serde(default, deserialize_with = "lenient")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub studios: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cover_image: Option<CoverImage>,
    #[serde(default, deserialize_with = "lenient")]
    pub embedding: Option<Vec<f32>>,
}

impl CatalogItem {
    /// The stored embedding, if it is present and non-empty.
    pub fn embedding_vector(&self) -> Option<&[f32]> {
        self.embedding.as_deref().filter(|v| !v.is_empty())
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding_vector().is_some()
    }
}

/// Catalog entry as returned to callers: scoring data and the embedding are stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: i64,
    pub title: Title,
    pub description: String,
    pub genres: Vec<String>,
    pub average_score: Option<i32>,
    pub episodes: Option<i32>,
    pub duration: Option<i32>,
    pub season: Option<String>,
    pub season_year: Option<i32>,
    pub status: Option<MediaStatus>,
    pub source: Option<String>,
    pub studios: Vec<String>,
    pub cover_image: Option<CoverImage>,
}

impl From<CatalogItem> for CatalogEntry {
    fn from(item: CatalogItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
            description: item.description,
            genres: item.genres,
            average_score: item.average_score,
            episodes: item.episodes,
            duration: item.duration,
            season: item.season,
            season_year: item.season_year,
            status: item.status,
            source: item.source,
            studios: item.studios,
            cover_image: item.cover_image,
        }
    }
}

/// Ranking output. Scores are only comparable within a single ranking call.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub item: CatalogItem,
    pub score: f32,
}

/// How a recommendation query is turned into a query vector
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum QueryMode {
    /// Reuse the stored embedding of the title named by the query
    #[strum(to_string = "anime_name", serialize = "name")]
    AnimeName,
    /// Embed `"Genres: {query}"`
    Genre,
    /// Embed the raw query text
    #[default]
    Description,
}

fn default_top_k() -> usize {
    10
}

/// Input for a recommendation lookup
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecommendationRequest {
    #[validate(length(min = 1, max = 1000))]
    pub query: String,
    #[serde(default)]
    pub mode: QueryMode,
    #[serde(default = "default_top_k")]
    #[validate(range(min = 1, max = 50))]
    pub top_k: usize,
}

impl RecommendationRequest {
    pub fn new(query: impl Into<String>, mode: QueryMode, top_k: usize) -> Self {
        Self {
            query: query.into().trim().to_string(),
            mode,
            top_k,
        }
    }
}

/// Persisted ingestion checkpoint: the next page to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionCursor {
    #[serde(rename = "_id")]
    pub id: String,
    pub current_page: u32,
}

impl Default for IngestionCursor {
    fn default() -> Self {
        Self {
            id: CURSOR_ID.to_string(),
            current_page: 1,
        }
    }
}

/// Summary of one committed ingestion page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub page: u32,
    pub fetched: usize,
    pub inserted: usize,
    /// Items stored without an embedding because the provider was unavailable
    pub missing_embeddings: usize,
    pub next_page: u32,
}

/// Result of a single page ingestion call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PageOutcome {
    Committed(IngestReport),
    /// The external catalog returned no items for this page; the cursor is unchanged.
    Exhausted { page: u32 },
}
