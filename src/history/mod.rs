//! Chat history persistence.

pub mod error;
pub mod model;
pub mod repository;
pub mod service;


pub use error::{HistoryError, HistoryResult};
pub use model::{CHAT_MSG, CHATS_MSG, ChatSession, ChatTurn, Envelope, HISTORY_MSG, HistoryEntry};
pub use repository::{ChatRepository, InMemoryChatRepository, JsonChatRepository};
pub use service::ChatService;
