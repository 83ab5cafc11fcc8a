//! Storage for chat history and transcripts.
//!
//! `JsonChatRepository` keeps two pretty-printed JSON files (`history.json`, `chats.json`)
//! in the shape `{error, errmsg, msg, data: [...]}`. `InMemoryChatRepository` is a
//! process-local stand-in.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::error::{HistoryError, HistoryResult};
use super::model::{CHATS_MSG, ChatSession, Envelope, HISTORY_MSG, HistoryEntry};

pub const HISTORY_FILE: &str = "history.json";
pub const CHATS_FILE: &str = "chats.json";

/// Load/save access to the two collections.
///
/// Implementations replace a collection as a whole; callers serialize read-modify-write cycles.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Recent chats, newest first.
    async fn load_history(&self) -> HistoryResult<Vec<HistoryEntry>>;
    async fn save_history(&self, entries: &[HistoryEntry]) -> HistoryResult<()>;
    /// All chat transcripts, newest first.
    async fn load_chats(&self) -> HistoryResult<Vec<ChatSession>>;
    async fn save_chats(&self, chats: &[ChatSession]) -> HistoryResult<()>;
}

/// File-backed repository under a data directory.
#[derive(Debug, Clone)]
pub struct JsonChatRepository {
    history_path: PathBuf,
    chats_path: PathBuf,
}

impl JsonChatRepository {
    /// Creates `dir` if needed and initializes missing or blank files with empty envelopes.
    pub async fn open(dir: impl AsRef<Path>) -> HistoryResult<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let repo = Self {
            history_path: dir.join(HISTORY_FILE),
            chats_path: dir.join(CHATS_FILE),
        };

        if needs_init(&repo.history_path).await? {
            let empty: Vec<HistoryEntry> = Vec::new();
            write_envelope(&repo.history_path, HISTORY_MSG, &empty).await?;
            info!(path = %repo.history_path.display(), "Initialized history file");
        }
        if needs_init(&repo.chats_path).await? {
            let empty: Vec<ChatSession> = Vec::new();
            write_envelope(&repo.chats_path, CHATS_MSG, &empty).await?;
            info!(path = %repo.chats_path.display(), "Initialized chats file");
        }

        Ok(repo)
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    pub fn chats_path(&self) -> &Path {
        &self.chats_path
    }
}

#[async_trait]
impl ChatRepository for JsonChatRepository {
    async fn load_history(&self) -> HistoryResult<Vec<HistoryEntry>> {
        read_envelope(&self.history_path).await
    }

    async fn save_history(&self, entries: &[HistoryEntry]) -> HistoryResult<()> {
        write_envelope(&self.history_path, HISTORY_MSG, entries).await
    }

    async fn load_chats(&self) -> HistoryResult<Vec<ChatSession>> {
        read_envelope(&self.chats_path).await
    }

    async fn save_chats(&self, chats: &[ChatSession]) -> HistoryResult<()> {
        write_envelope(&self.chats_path, CHATS_MSG, chats).await
    }
}

async fn needs_init(path: &Path) -> HistoryResult<bool> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(contents.trim().is_empty()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

async fn read_envelope<T: DeserializeOwned>(path: &Path) -> HistoryResult<Vec<T>> {
    let contents = tokio::fs::read_to_string(path).await?;
    let envelope: Envelope<Vec<T>> =
        serde_json::from_str(&contents).map_err(|source| HistoryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(envelope.data)
}

/// Writes through a temp file in the same directory, then renames over `path`.
async fn write_envelope<T: Serialize>(path: &Path, msg: &str, data: &[T]) -> HistoryResult<()> {
    let body = serde_json::to_vec_pretty(&Envelope::ok(msg, data)).map_err(|source| {
        HistoryError::Serialize {
            what: "envelope",
            source,
        }
    })?;

    let target = path.to_path_buf();
    let bytes = body.len();
    tokio::task::spawn_blocking(move || persist_atomically(&target, &body))
        .await
        .map_err(|e| HistoryError::Task(e.to_string()))??;

    debug!(path = %path.display(), bytes, "Saved envelope");
    Ok(())
}

fn persist_atomically(path: &Path, body: &[u8]) -> HistoryResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
    temp_file.write_all(body)?;
    temp_file.as_file().sync_all()?;
    temp_file
        .persist(path)
        .map_err(|e| HistoryError::Persist {
            path: path.to_path_buf(),
            reason: e.error.to_string(),
        })?;
    Ok(())
}

/// Process-local repository.
#[derive(Debug, Default)]
pub struct InMemoryChatRepository {
    history: RwLock<Vec<HistoryEntry>>,
    chats: RwLock<Vec<ChatSession>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn load_history(&self) -> HistoryResult<Vec<HistoryEntry>> {
        Ok(self.history.read().clone())
    }

    async fn save_history(&self, entries: &[HistoryEntry]) -> HistoryResult<()> {
        *self.history.write() = entries.to_vec();
        Ok(())
    }

    async fn load_chats(&self) -> HistoryResult<Vec<ChatSession>> {
        Ok(self.chats.read().clone())
    }

    async fn save_chats(&self, chats: &[ChatSession]) -> HistoryResult<()> {
        *self.chats.write() = chats.to_vec();
        Ok(())
    }
}
