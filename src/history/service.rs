use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::HistoryResult;
use super::model::{ChatSession, ChatTurn, HistoryEntry};
use super::repository::ChatRepository;
use crate::constants::HISTORY_RETENTION;
use crate::generation::clean_response;

/// Chat bookkeeping on top of a [`ChatRepository`].
///
/// Every read-modify-write cycle runs under one async mutex, so concurrent requests cannot
/// lose each other's updates or be handed the same new chat id.
pub struct ChatService<R> {
    repo: R,
    /// Highest chat id handed out so far; guards all writes.
    issued: Mutex<u64>,
    retention: usize,
}

impl<R> std::fmt::Debug for ChatService<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("retention", &self.retention)
            .finish()
    }
}

impl<R: ChatRepository> ChatService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            issued: Mutex::new(0),
            retention: HISTORY_RETENTION,
        }
    }

    /// Number of history entries kept. Clamped to at least 1.
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Reserves a fresh chat id: one above every stored or previously issued id.
    pub async fn next_chat_id(&self) -> HistoryResult<u64> {
        let mut issued = self.issued.lock().await;

        let history_max = self.repo.load_history().await?.iter().map(|e| e.chat_id).max();
        let chats_max = self.repo.load_chats().await?.iter().map(|c| c.chat_id).max();
        let stored = history_max.max(chats_max).unwrap_or(0);

        let next = stored.max(*issued) + 1;
        *issued = next;
        debug!(chat_id = next, "Issued chat id");
        Ok(next)
    }

    /// Appends a question/answer turn to `chat_id` and, for a new chat, lists it in history.
    ///
    /// The response is stored with reasoning spans removed.
    pub async fn record_exchange(
        &self,
        chat_id: u64,
        question: &str,
        response: &str,
        is_new_chat: bool,
    ) -> HistoryResult<ChatTurn> {
        let _guard = self.issued.lock().await;
        let timestamp = Utc::now().timestamp();

        let turn = ChatTurn {
            question: question.to_string(),
            response: clean_response(response),
            timestamp,
        };

        let mut chats = self.repo.load_chats().await?;
        match chats.iter_mut().find(|c| c.chat_id == chat_id) {
            Some(session) => session.data.push(turn.clone()),
            None => chats.insert(
                0,
                ChatSession {
                    chat_id,
                    chat_heading: question.to_string(),
                    data: vec![turn.clone()],
                },
            ),
        }
        self.repo.save_chats(&chats).await?;

        if is_new_chat {
            let mut history = self.repo.load_history().await?;
            let heading = history
                .iter()
                .find(|e| e.chat_id == chat_id)
                .map(|e| e.chat_heading.clone())
                .unwrap_or_else(|| question.to_string());
            history.retain(|e| e.chat_id != chat_id);
            history.insert(
                0,
                HistoryEntry {
                    chat_id,
                    chat_heading: heading,
                    timestamp,
                },
            );
            history.truncate(self.retention);
            self.repo.save_history(&history).await?;
        }

        debug!(chat_id, is_new_chat, "Recorded exchange");
        Ok(turn)
    }

    /// Recent chats, newest first.
    pub async fn history(&self) -> HistoryResult<Vec<HistoryEntry>> {
        self.repo.load_history().await
    }

    pub async fn chat(&self, chat_id: u64) -> HistoryResult<Option<ChatSession>> {
        Ok(self
            .repo
            .load_chats()
            .await?
            .into_iter()
            .find(|c| c.chat_id == chat_id))
    }
}
