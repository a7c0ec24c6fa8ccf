use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("No catalog entry matches '{0}'")]
    NotFound(String),

    #[error("No catalog entries matched the query")]
    NoMatches,

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Ingestion of page {page} failed: {reason}")]
    IngestionPageFailure { page: u32, reason: String },

    #[error("Catalog entry '{0}' already exists")]
    DuplicateEntry(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    /// Whether retrying the same call later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::EmbeddingUnavailable(_)
                | CatalogError::ProviderUnavailable(_)
                | CatalogError::IngestionPageFailure { .. }
                | CatalogError::Database(_)
        )
    }
}

impl From<mongodb::error::Error> for CatalogError {
    fn from(err: mongodb::error::Error) -> Self {
        CatalogError::Database(err.to_string())
    }
}

impl From<mongodb::bson::de::Error> for CatalogError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        CatalogError::Database(format!("BSON decode error: {}", err))
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::ProviderUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Internal(format!("JSON error: {}", err))
    }
}

impl From<validator::ValidationErrors> for CatalogError {
    fn from(err: validator::ValidationErrors) -> Self {
        CatalogError::Validation(err.to_string())
    }
}

impl From<core_config::ConfigError> for CatalogError {
    fn from(err: core_config::ConfigError) -> Self {
        CatalogError::Config(err.to_string())
    }
}
