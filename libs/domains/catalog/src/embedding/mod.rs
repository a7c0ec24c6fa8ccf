mod gateway;
mod gemini;
mod openai;
mod provider;

pub use gateway::{Embedding, EmbeddingGateway};
pub use gemini::{GeminiEmbeddingConfig, GeminiEmbeddingProvider};
pub use openai::{OpenAIConfig, OpenAIProvider};
pub use provider::EmbeddingProvider;

#[cfg(test)]
pub use provider::MockEmbeddingProvider;
