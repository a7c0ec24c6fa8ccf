//! AniList GraphQL client
//!
//! The external catalog that ingestion reads from. Results are mapped into
//! [`CatalogItem`]s at this boundary: descriptions are cleaned, studios are
//! flattened and lookup titles are normalized.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{CatalogItem, CoverImage, MediaStatus, Title, lenient, lenient_or_default};
use crate::text::{clean_markup, embedding_source};

pub const DEFAULT_ANILIST_URL: &str = "https://graphql.anilist.co";
pub const DEFAULT_ANILIST_TIMEOUT: Duration = Duration::from_secs(60);

const MEDIA_FIELDS: &str = r#"
    id
    title { romaji english }
    description
    genres
    averageScore
    episodes
    duration
    season
    seasonYear
    status
    source
    studios { nodes { name } }
    coverImage { large }
"#;

/// Source of catalog records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// One page of the most popular titles
    async fn fetch_page(&self, page: u32, per_page: u32) -> CatalogResult<Vec<AniListMedia>>;

    /// Best match for a search term, `None` when nothing matches
    async fn search(&self, term: &str) -> CatalogResult<Option<AniListMedia>>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaTitle {
    #[serde(default, deserialize_with = "lenient")]
    pub romaji: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub english: Option<String>,
}

/// A studio reference as either `{ "name": .. }` or a bare string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StudioRef {
    Named { name: String },
    Plain(String),
}

impl StudioRef {
    fn into_name(self) -> String {
        match self {
            StudioRef::Named { name } | StudioRef::Plain(name) => name,
        }
    }
}

/// Studio payload shapes seen from the catalog and from older stored records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Studios {
    Nested { nodes: Vec<StudioRef> },
    Flat(Vec<StudioRef>),
}

impl Default for Studios {
    fn default() -> Self {
        Studios::Flat(Vec::new())
    }
}

impl Studios {
    /// Flat list of studio names
    pub fn into_names(self) -> Vec<String> {
        let refs = match self {
            Studios::Nested { nodes } => nodes,
            Studios::Flat(refs) => refs,
        };
        refs.into_iter()
            .map(StudioRef::into_name)
            .filter(|name| !name.trim().is_empty())
            .collect()
    }
}

/// Raw media record from AniList
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AniListMedia {
    pub id: i64,
    #[serde(default)]
    pub title: MediaTitle,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub genres: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub average_score: Option<i32>,
    #[serde(default, deserialize_with = "lenient")]
    pub episodes: Option<i32>,
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
    pub studios: Studios,
    #[serde(default, deserialize_with = "lenient")]
    pub cover_image: Option<CoverImage>,
}

impl AniListMedia {
    /// Normalized lookup titles used for duplicate detection
    pub fn lookup_titles(&self) -> Vec<String> {
        Title::from_display(self.title.romaji.clone(), self.title.english.clone()).lookup_keys()
    }

    /// Text to embed, built from original-case titles and the cleaned description
    pub fn embedding_source(&self) -> String {
        embedding_source(
            self.title.romaji.as_deref(),
            self.title.english.as_deref(),
            &clean_markup(self.description.as_deref().unwrap_or_default()),
            &self.genres,
        )
    }

    /// Map into a storable catalog item
    pub fn into_item(self, embedding: Option<Vec<f32>>) -> CatalogItem {
        CatalogItem {
            id: self.id,
            title: Title::from_display(self.title.romaji, self.title.english),
            description: clean_markup(self.description.as_deref().unwrap_or_default()),
            genres: self.genres,
            average_score: self.average_score,
            episodes: self.episodes,
            duration: self.duration,
            season: self.season,
            season_year: self.season_year,
            status: self.status,
            source: self.source,
            studios: self.studios.into_names(),
            cover_image: self.cover_image,
            embedding: embedding.filter(|v| !v.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(rename = "Page")]
    page: Option<MediaPage>,
}

#[derive(Debug, Deserialize)]
struct MediaPage {
    #[serde(default)]
    media: Vec<AniListMedia>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(rename = "Media")]
    media: Option<AniListMedia>,
}

/// HTTP client for the AniList GraphQL API
pub struct AniListClient {
    client: Client,
    url: String,
}

impl AniListClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> CatalogResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_env() -> CatalogResult<Self> {
        Self::new(
            core_config::env_or_default("ANILIST_URL", DEFAULT_ANILIST_URL),
            DEFAULT_ANILIST_TIMEOUT,
        )
    }

    fn page_query() -> String {
        format!(
            "query ($page: Int, $perPage: Int) {{ Page(page: $page, perPage: $perPage) {{ media(type: ANIME, sort: POPULARITY_DESC) {{ {} }} }} }}",
            MEDIA_FIELDS
        )
    }

    fn search_query() -> String {
        format!(
            "query ($search: String) {{ Media(search: $search, type: ANIME) {{ {} }} }}",
            MEDIA_FIELDS
        )
    }

    async fn post(&self, query: String, variables: serde_json::Value) -> CatalogResult<reqwest::Response> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        Ok(response)
    }
}

fn first_error(errors: &[GraphQlError]) -> String {
    errors
        .first()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| "empty response".to_string())
}

#[async_trait]
impl CatalogSource for AniListClient {
    #[instrument(skip(self))]
    async fn fetch_page(&self, page: u32, per_page: u32) -> CatalogResult<Vec<AniListMedia>> {
        let response = self
            .post(Self::page_query(), json!({ "page": page, "perPage": per_page }))
            .await?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::ProviderUnavailable(format!(
                "AniList returned {}: {}",
                status, body
            )));
        }

        let body: GraphQlResponse<PageData> = response.json().await?;
        match body.data.and_then(|d| d.page) {
            Some(page) => Ok(page.media),
            None => Err(CatalogError::ProviderUnavailable(first_error(&body.errors))),
        }
    }

    #[instrument(skip(self))]
    async fn search(&self, term: &str) -> CatalogResult<Option<AniListMedia>> {
        let response = self
            .post(Self::search_query(), json!({ "search": term }))
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: GraphQlResponse<SearchData> = response.json().await?;
                Ok(body.data.and_then(|d| d.media))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CatalogError::ProviderUnavailable(format!(
                    "AniList returned {}: {}",
                    status, body
                )))
            }
        }
    }
}
