//! Conversation Context Manager
//!
//! Grounded chat: each reply is limited to catalog items retrieved for the
//! message, and each session keeps its own bounded history.

mod completion;
mod gemini;
mod history;
mod openrouter;
mod profiles;
mod prompt;
mod service;

pub use completion::{Backend, CompletionProvider, CompletionRequest};
pub use gemini::GeminiChatProvider;
pub use history::{
    ConversationHistory, ConversationTurn, HISTORY_CAP, HistoryStore, PROMPT_TURNS, Role,
};
pub use openrouter::OpenRouterProvider;
pub use profiles::{FALLBACK_SENTENCE, ModelIdentifier, ModelInfo, ModelProfile, available_models};
pub use prompt::{build_request, context_block, format_card};
pub use service::{APOLOGY, ConversationService, DEFAULT_CONTEXT_SIZE};
