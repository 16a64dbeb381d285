//! Per-session chat history.
//!
//! Histories live in memory for the process lifetime and are created lazily
//! on first use. Each is capped; eviction drops the oldest messages first and
//! never leaves a history opening with an AI message.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use unichat_llm::ChatMessage;

/// Default per-session message cap.
pub const DEFAULT_HISTORY_CAP: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Ai,
            content: content.into(),
        }
    }

    /// The chat-completion form of this message.
    pub fn to_chat(&self) -> ChatMessage {
        match self.role {
            MessageRole::Human => ChatMessage::user(self.content.clone()),
            MessageRole::Ai => ChatMessage::assistant(self.content.clone()),
        }
    }
}

#[derive(Debug)]
pub struct SessionHistoryStore {
    sessions: RwLock<HashMap<String, Vec<Message>>>,
    cap: AtomicUsize,
}

impl Default for SessionHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl SessionHistoryStore {
    pub fn new(cap: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            cap: AtomicUsize::new(cap),
        }
    }

    // A poisoned map is still structurally valid; keep serving it.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Message>>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Message>>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn cap(&self) -> usize {
        self.cap.load(Ordering::Relaxed)
    }

    pub fn set_cap(&self, cap: usize) {
        self.cap.store(cap, Ordering::Relaxed);
    }

    /// Copy of a session's history, creating the session if it is new.
    pub fn snapshot(&self, session_id: &str) -> Vec<Message> {
        if let Some(history) = self.read().get(session_id) {
            return history.clone();
        }
        self.write()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Copy of a session's history without creating it.
    pub fn get(&self, session_id: &str) -> Option<Vec<Message>> {
        self.read().get(session_id).cloned()
    }

    /// Append one completed exchange and enforce the cap.
    pub fn record_exchange(&self, session_id: &str, question: &str, answer: &str) {
        let cap = self.cap();
        let mut sessions = self.write();
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push(Message::human(question));
        history.push(Message::ai(answer));

        let evicted = trim_history(history, cap);
        if evicted > 0 {
            tracing::debug!(session = %session_id, evicted, cap, "Trimmed session history");
        }
    }

    /// Forget every session.
    pub fn clear_all(&self) {
        let mut sessions = self.write();
        let count = sessions.len();
        sessions.clear();
        tracing::info!(sessions = count, "Cleared all session histories");
    }

    /// Number of known sessions.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Drop the oldest messages until at most `cap` remain and the first one is
/// a human message. Returns how many were dropped.
fn trim_history(history: &mut Vec<Message>, cap: usize) -> usize {
    let mut excess = history.len().saturating_sub(cap);
    while excess < history.len() && history[excess].role != MessageRole::Human {
        excess += 1;
    }
    history.drain(..excess);
    excess
}
