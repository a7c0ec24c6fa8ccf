//! Model catalogue: which models a conversation may use and how each is prompted

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use super::completion::Backend;

/// Sentence the model must answer with when the context has nothing relevant
pub const FALLBACK_SENTENCE: &str = "I couldn't find anything in the catalog that matches that.";

const PERSONA: &str = "You are a friendly anime recommendation assistant. \
Recommend titles ONLY from the catalog context supplied with the user's message. \
Never mention, invent or recommend a title that is not in that context. \
When you recommend a title, name it and say briefly why it fits.";

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
    EnumIter,
)]
pub enum ModelIdentifier {
    #[default]
    #[strum(serialize = "mistralai/devstral-2512:free")]
    #[serde(rename = "mistralai/devstral-2512:free")]
    Devstral,
    #[strum(serialize = "openai/gpt-oss-20b:free")]
    #[serde(rename = "openai/gpt-oss-20b:free")]
    GptOss,
    #[strum(serialize = "meta-llama/llama-3.3-70b-instruct:free")]
    #[serde(rename = "meta-llama/llama-3.3-70b-instruct:free")]
    Llama,
    #[strum(serialize = "gemini-2.5-flash")]
    #[serde(rename = "gemini-2.5-flash")]
    GeminiFlash,
}

/// Prompting and routing for one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProfile {
    pub id: ModelIdentifier,
    pub label: &'static str,
    pub instruction: String,
    pub backend: Backend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub label: &'static str,
}

impl ModelIdentifier {
    /// Unrecognized identifiers resolve to the default model
    pub fn parse_or_default(raw: &str) -> Self {
        raw.trim().parse().unwrap_or_default()
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelIdentifier::Devstral => "MistralAI (Fast)",
            ModelIdentifier::GptOss => "GPT-OSS (Creative)",
            ModelIdentifier::Llama => "Llama 3.3 (Smart)",
            ModelIdentifier::GeminiFlash => "Gemini Flash",
        }
    }

    pub fn profile(self) -> ModelProfile {
        let (style, backend) = match self {
            ModelIdentifier::Devstral => (
                "Keep answers short: at most three recommendations, one sentence each.",
                Backend::OpenRouter,
            ),
            ModelIdentifier::GptOss => (
                "Be playful and enthusiastic, and connect picks to the mood the user describes.",
                Backend::OpenRouter,
            ),
            ModelIdentifier::Llama => (
                "Compare the candidates against the request and explain the best matches in detail.",
                Backend::OpenRouter,
            ),
            ModelIdentifier::GeminiFlash => (
                "Be concise and informative, and mention episode counts when they help.",
                Backend::Gemini,
            ),
        };

        ModelProfile {
            id: self,
            label: self.label(),
            instruction: format!(
                "{} {} If nothing in the context fits, reply exactly: \"{}\"",
                PERSONA, style, FALLBACK_SENTENCE
            ),
            backend,
        }
    }
}

/// Every selectable model with its display label
pub fn available_models() -> Vec<ModelInfo> {
    ModelIdentifier::iter()
        .map(|id| ModelInfo {
            id: id.to_string(),
            label: id.label(),
        })
        .collect()
}
