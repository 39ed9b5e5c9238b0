pub mod llm;
pub mod prompts;
pub mod responses;

pub use llm::{ChatMessage, EmbeddingProvider, LanguageModel, OpenAiChat, OpenAiEmbedder, Role};
pub use responses::ResponsesClient;
