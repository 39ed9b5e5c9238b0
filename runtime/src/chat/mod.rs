pub mod generator;
pub mod memory;
pub mod sessions;
pub mod tokens;

pub use generator::{Answer, ConversationalGenerator, GeneratorBuilder, GeneratorConfig};
pub use memory::{ConversationMemory, HistoryWindow, Turn};
pub use sessions::{SessionConfig, SessionRegistry, SharedGenerator};
pub use tokens::{TiktokenTokenizer, Tokenizer};
