pub mod chat;

pub mod types;

pub use chat::chat_routes;
