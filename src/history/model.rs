use serde::{Deserialize, Serialize};

pub const HISTORY_MSG: &str = "Successfully sent ai history";
pub const CHATS_MSG: &str = "Successfully sent chat data";
pub const CHAT_MSG: &str = "Successfully retrieved chat";

/// One line of the recent-chats sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub chat_id: u64,
    /// First question of the chat, untruncated.
    pub chat_heading: String,
    /// Unix seconds.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    /// Response with reasoning spans removed.
    pub response: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub chat_id: u64,
    pub chat_heading: String,
    #[serde(default)]
    pub data: Vec<ChatTurn>,
}

/// On-disk and over-the-wire wrapper: `{error, errmsg, msg, data}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub errmsg: Option<String>,
    #[serde(default)]
    pub msg: String,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn ok(msg: impl Into<String>, data: T) -> Self {
        Self {
            error: false,
            errmsg: None,
            msg: msg.into(),
            data,
        }
    }
}
