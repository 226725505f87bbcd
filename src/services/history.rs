// src/services/history.rs
use crate::errors::ZenError;
use crate::models::{MoodDraft, MoodEntry};
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

pub const NO_HISTORY: &str = "No previous history.";

/// Append-only log of past mood entries. There is no update or
/// delete: entries are immutable once they have an id.
#[async_trait]
pub trait HistoryLog: Send + Sync {
    /// Stores the draft and returns the id assigned to it.
    async fn append(&self, draft: MoodDraft) -> Result<u64, ZenError>;

    /// Up to `n` entries, newest first. Timestamp ties go to the higher id.
    async fn recent(&self, n: usize) -> Result<Vec<MoodEntry>, ZenError>;

    async fn summarize(&self, n: usize) -> Result<String, ZenError> {
        let entries = self.recent(n).await?;
        Ok(summarize_entries(&entries))
    }
}

pub fn summarize_entries(entries: &[MoodEntry]) -> String {
    if entries.is_empty() {
        return NO_HISTORY.to_string();
    }

    entries
        .iter()
        .map(|e| {
            format!(
                "[{}] User felt {}: \"{}\"",
                e.timestamp.format("%Y-%m-%d"),
                e.realm,
                e.input.replace(['\r', '\n'], " ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fire-and-forget append. Failures are logged and swallowed so they never
/// reach the interaction that produced the entry.
pub fn record_in_background(history: Arc<dyn HistoryLog>, draft: MoodDraft) -> JoinHandle<()> {
    tokio::spawn(async move {
        let realm = draft.realm.clone();
        match history.append(draft).await {
            Ok(id) => debug!("Recorded mood entry {} ({})", id, realm),
            Err(e) => warn!("Failed to record mood entry: {}", e),
        }
    })
}

/// Process-local log, used when the durable store is unreachable and in tests.
#[derive(Default)]
pub struct MemoryHistory {
    inner: Mutex<MemoryLog>,
}

#[derive(Default)]
struct MemoryLog {
    next_id: u64,
    entries: Vec<MoodEntry>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|log| log.entries.len()).unwrap_or(0)
    }
}

#[async_trait]
impl HistoryLog for MemoryHistory {
    async fn append(&self, draft: MoodDraft) -> Result<u64, ZenError> {
        let mut log = self
            .inner
            .lock()
            .map_err(|e| ZenError::Persistence(e.to_string()))?;
        log.next_id += 1;
        let id = log.next_id;
        log.entries.push(draft.into_entry(id));
        Ok(id)
    }

    async fn recent(&self, n: usize) -> Result<Vec<MoodEntry>, ZenError> {
        let log = self
            .inner
            .lock()
            .map_err(|e| ZenError::Persistence(e.to_string()))?;
        let mut entries = log.entries.clone();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        entries.truncate(n);
        Ok(entries)
    }
}
