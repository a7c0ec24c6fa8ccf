//! Conversation service: grounded replies over per-session history

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use super::completion::{Backend, CompletionProvider};
use super::history::{ConversationTurn, HistoryStore, PROMPT_TURNS};
use super::profiles::ModelIdentifier;
use super::prompt::{build_request, context_block};
use crate::embedding::{Embedding, EmbeddingGateway};
use crate::error::{CatalogError, CatalogResult};
use crate::models::RankedCandidate;
use crate::ranking::SimilarityRanker;

/// Candidates retrieved to ground each reply
pub const DEFAULT_CONTEXT_SIZE: usize = 15;

/// Reply used whenever the completion provider fails or answers with nothing
pub const APOLOGY: &str =
    "Sorry, I'm having trouble answering right now. Please try again in a moment.";

const MAX_MESSAGE_CHARS: usize = 2000;

pub struct ConversationService {
    history: HistoryStore,
    gateway: EmbeddingGateway,
    ranker: SimilarityRanker,
    providers: HashMap<Backend, Arc<dyn CompletionProvider>>,
    context_size: usize,
    timeout: Duration,
}

impl ConversationService {
    pub fn new(
        history: HistoryStore,
        gateway: EmbeddingGateway,
        ranker: SimilarityRanker,
        timeout: Duration,
    ) -> Self {
        Self {
            history,
            gateway,
            ranker,
            providers: HashMap::new(),
            context_size: DEFAULT_CONTEXT_SIZE,
            timeout,
        }
    }

    /// Register the provider serving a backend; replaces any earlier one
    pub fn with_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.providers.insert(provider.backend(), provider);
        self
    }

    pub fn with_context_size(mut self, context_size: usize) -> Self {
        self.context_size = context_size;
        self
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Answer `message` within `session_id`.
    ///
    /// Only an empty or oversized message is an error. Retrieval and completion
    /// failures degrade to an empty context or the apology reply.
    #[instrument(skip(self, message))]
    pub async fn reply(
        &self,
        session_id: &str,
        message: &str,
        model: ModelIdentifier,
    ) -> CatalogResult<String> {
        let message = message.trim();
        if message.is_empty() || message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(CatalogError::Validation(format!(
                "message must be 1..={} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let session = self.history.session(session_id).await;
        let mut history = session.lock().await;

        history.push(ConversationTurn::user(message));

        let candidates = self.grounding(message).await;
        let context = context_block(&candidates);

        let profile = model.profile();
        let request = build_request(&profile, history.recent(PROMPT_TURNS, 1), message, &context);

        let reply = match self.providers.get(&profile.backend) {
            Some(provider) => {
                match tokio::time::timeout(self.timeout, provider.complete(&request)).await {
                    Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
                    Ok(Ok(_)) => {
                        tracing::warn!("Completion provider returned an empty reply");
                        APOLOGY.to_string()
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "Completion provider failed");
                        APOLOGY.to_string()
                    }
                    Err(_) => {
                        tracing::warn!(timeout_secs = self.timeout.as_secs(), "Completion timed out");
                        APOLOGY.to_string()
                    }
                }
            }
            None => {
                tracing::warn!(backend = %profile.backend, "No completion provider configured");
                APOLOGY.to_string()
            }
        };

        history.push(ConversationTurn::assistant(reply.clone()));

        tracing::info!(
            candidates = candidates.len(),
            history_len = history.len(),
            "Conversation turn completed"
        );
        Ok(reply)
    }

    async fn grounding(&self, message: &str) -> Vec<RankedCandidate> {
        let vector = match self.gateway.embed(message).await {
            Embedding::Available(vector) => vector,
            Embedding::Unavailable => return Vec::new(),
        };

        match self.ranker.rank(&vector, self.context_size).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "Grounding retrieval failed");
                Vec::new()
            }
        }
    }
}
