//! Per-subject bounded conversation log with best-effort persistence.
//!
//! Each subject owns one ordered log of turns, replayed verbatim to the
//! backend with every chat request. The log is capped (40 turns by
//! default); appending past the cap evicts the oldest turns first. After
//! every mutation the whole log is written to `chat_history_{subject}`.
//!
//! Persistence never interrupts a chat: read failures and corrupt data
//! restore as an empty log, write failures are logged and the in-memory
//! log stays authoritative for the session.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tutor_common::config::HistoryConfig;

use crate::storage::KeyValueStore;
use crate::subject::Subject;

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message; immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    role: Role,
    content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered, bounded sequence of turns for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationLog {
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
}

impl ConversationLog {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns,
        }
    }

    /// Build from existing turns, keeping only the newest `max_turns`.
    pub fn from_turns(turns: impl IntoIterator<Item = ConversationTurn>, max_turns: usize) -> Self {
        let mut log = Self::new(max_turns);
        log.turns.extend(turns);
        log.trim();
        log
    }

    /// Append one user/assistant exchange, evicting from the head past the cap.
    pub fn push_exchange(&mut self, user: ConversationTurn, assistant: ConversationTurn) {
        self.turns.push_back(user);
        self.turns.push_back(assistant);
        self.trim();
    }

    fn trim(&mut self) {
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// Turns in chronological order, as sent to the backend.
    pub fn to_vec(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.turns)
    }
}

/// Holds the active subject's log and persists it through a [`KeyValueStore`].
pub struct ConversationStore {
    store: Arc<dyn KeyValueStore>,
    max_turns: usize,
    image_marker: String,
    active: Option<Subject>,
    log: ConversationLog,
}

impl ConversationStore {
    /// The cap is rounded down to whole exchanges (at least one) so eviction
    /// never splits a user turn from its reply.
    pub fn new(store: Arc<dyn KeyValueStore>, config: &HistoryConfig) -> Self {
        let max_turns = (config.max_turns & !1).max(2);
        if max_turns != config.max_turns {
            tracing::warn!(
                configured = config.max_turns,
                max_turns,
                "History cap must be an even number of turns, adjusted"
            );
        }
        Self {
            store,
            max_turns,
            image_marker: config.image_marker.clone(),
            active: None,
            log: ConversationLog::new(max_turns),
        }
    }

    pub fn with_defaults(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, &HistoryConfig::default())
    }

    pub fn active_subject(&self) -> Option<&Subject> {
        self.active.as_ref()
    }

    /// The active subject's log (empty when no subject is selected).
    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Make `subject` active, replacing the in-memory log with its persisted one.
    pub fn switch_subject(&mut self, subject: &Subject) -> &ConversationLog {
        self.log = self.restore(subject);
        self.active = Some(subject.clone());
        tracing::info!(subject = %subject, turns = self.log.len(), "Switched subject");
        &self.log
    }

    /// Load the persisted log for `subject`; missing or unreadable data yields an empty log.
    pub fn restore(&self, subject: &Subject) -> ConversationLog {
        let key = subject.history_key();
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return ConversationLog::new(self.max_turns),
            Err(e) => {
                tracing::warn!(subject = %subject, error = %e, "Failed to read conversation history");
                return ConversationLog::new(self.max_turns);
            }
        };

        match serde_json::from_str::<Vec<ConversationTurn>>(&raw) {
            Ok(turns) => {
                let log = ConversationLog::from_turns(turns, self.max_turns);
                tracing::debug!(subject = %subject, turns = log.len(), "Restored conversation history");
                log
            }
            Err(e) => {
                tracing::warn!(
                    subject = %subject,
                    error = %e,
                    "Discarding corrupt conversation history"
                );
                ConversationLog::new(self.max_turns)
            }
        }
    }

    /// Write `log` under the subject's key. Failures are logged, never returned.
    pub fn persist(&self, subject: &Subject, log: &ConversationLog) {
        let json = match log.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(subject = %subject, error = %e, "Failed to serialize conversation history");
                return;
            }
        };
        if let Err(e) = self.store.set(&subject.history_key(), &json) {
            tracing::warn!(
                subject = %subject,
                backend = self.store.name(),
                error = %e,
                "Failed to save conversation history"
            );
        }
    }

    /// Record one successful exchange for `subject` and persist the result.
    ///
    /// Switches to `subject` first if it is not the active one.
    pub fn append_exchange(
        &mut self,
        subject: &Subject,
        user_text: &str,
        has_image: bool,
        assistant_text: &str,
    ) {
        if self.active.as_ref() != Some(subject) {
            self.switch_subject(subject);
        }

        let user_content = if has_image {
            format!("{user_text}{}", self.image_marker)
        } else {
            user_text.to_string()
        };
        self.log.push_exchange(
            ConversationTurn::user(user_content),
            ConversationTurn::assistant(assistant_text),
        );
        self.persist(subject, &self.log);
    }

    /// Forget `subject`'s history, in memory and in storage.
    pub fn clear(&mut self, subject: &Subject) {
        if self.active.as_ref() == Some(subject) {
            self.log = ConversationLog::new(self.max_turns);
        }
        if let Err(e) = self.store.remove(&subject.history_key()) {
            tracing::warn!(subject = %subject, error = %e, "Failed to clear conversation history");
        }
    }
}
