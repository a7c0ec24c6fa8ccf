//! Catalog Domain
//!
//! Semantic retrieval and recommendation over an anime catalog stored in
//! MongoDB, with embeddings from Gemini or any OpenAI-compatible API.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Ingestion  │   │  Resolver    │   │ Conversation │  ← Services
//! └─────┬──────┘   └──────┬───────┘   └──────┬───────┘
//!       │                 │                  │
//!       │          ┌──────▼──────────────────▼──┐
//!       │          │     Similarity Ranker      │  ← exhaustive | $vectorSearch
//!       │          └──────────────┬─────────────┘
//!       │                         │
//! ┌─────▼─────────────────────────▼────────────┐
//! │ Embedding Gateway · Repository · AniList   │  ← Providers and storage
//! └────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use core_config::FromEnv;
//! use domain_catalog::{
//!     EngineConfig, MongoCatalogRepository, QueryMode, RecommendationRequest,
//!     RecommendationResolver, SimilarityRanker,
//! };
//! use mongodb::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_env()?;
//! let client = Client::with_uri_str("mongodb://localhost:27017").await?;
//! let repository = Arc::new(MongoCatalogRepository::new(&client.database("anime_recommendation")));
//!
//! let ranker = SimilarityRanker::new(repository.clone(), config.ranking_strategy);
//! let resolver = RecommendationResolver::new(repository, config.embedding_gateway()?, ranker);
//!
//! let picks = resolver
//!     .recommend(RecommendationRequest::new("giant robots fighting", QueryMode::Description, 5))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod anilist;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingestion;
pub mod models;
pub mod mongodb;
pub mod ranking;
pub mod repository;
pub mod resolver;
pub mod text;

#[cfg(test)]
mod testing;

pub use anilist::{AniListClient, AniListMedia, CatalogSource};
pub use catalog::CatalogService;
pub use chat::{ConversationService, HistoryStore, ModelIdentifier};
pub use config::{EmbeddingBackend, EngineConfig};
pub use embedding::{Embedding, EmbeddingGateway, EmbeddingProvider};
pub use error::{CatalogError, CatalogResult};
pub use ingestion::{IngestionCoordinator, RunSummary};
pub use models::{
    CatalogEntry, CatalogItem, IngestReport, IngestionCursor, PageOutcome, QueryMode,
    RankedCandidate, RecommendationRequest, Title,
};
pub use crate::mongodb::{MongoCatalogRepository, MongoCursorRepository};
pub use ranking::{RankingStrategy, SimilarityRanker, cosine_similarity};
pub use repository::{CatalogRepository, CursorRepository, VectorQuery};
pub use resolver::RecommendationResolver;
