use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::history::ConversationTurn;
use crate::error::CatalogResult;

/// Completion backends a model profile can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Backend {
    /// OpenAI-compatible chat completions (OpenRouter)
    OpenRouter,
    /// Gemini `generateContent`
    Gemini,
}

/// Request envelope shared by the completion providers.
///
/// Turns use the internal role vocabulary; each provider translates it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub turns: Vec<ConversationTurn>,
}

/// Trait implemented by concrete chat completion providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn backend(&self) -> Backend;

    /// Reply text for the request; may be empty
    async fn complete(&self, request: &CompletionRequest) -> CatalogResult<String>;
}
