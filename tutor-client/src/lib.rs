//! Tutor Client - Backend client and local state for the Tutor study assistant.
//!
//! This crate provides:
//! - A retrying request dispatcher with per-attempt timeouts
//! - Typed calls for the backend's chat, image, memory and import endpoints
//! - Per-subject conversation logs persisted in a key-value store
//! - The API key ring and image attachments
//! - [`ChatSession`], which ties the above together
//!
//! ```text
//! ChatSession ── ConversationStore ── KeyValueStore (SQLite / memory)
//!      │
//!      └── TutorApi ── Dispatcher ── Transport (reqwest)
//!                          │
//!                          └── timeout + linear backoff per attempt
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod api;
pub mod dispatch;
pub mod history;
pub mod image;
pub mod keys;
pub mod session;
pub mod storage;
pub mod subject;
pub mod transfer;
pub mod transport;

// Re-export commonly used types
pub use api::{ApiError, ChatMode, ChatPayload, ChatReply, ImportReply, TutorApi};
pub use dispatch::{DispatchConfig, DispatchError, DispatchResponse, Dispatcher, RequestOutcome};
pub use history::{ConversationLog, ConversationStore, ConversationTurn, Role};
pub use image::{ImageAttachment, DEFAULT_MAX_IMAGE_BYTES};
pub use keys::{mask_key, ApiKeyring};
pub use session::{failure_message, ChatSession, SessionError, QUIZ_PROMPT};
pub use storage::{open_store, KeyValueStore, MemoryStore, SqliteStore, StoreError};
pub use subject::Subject;
pub use transfer::{
    export_memory, export_wrong_questions, import_file, ImportKind, ImportSummary, TransferError,
};
pub use transport::{HttpRequest, Method, ReqwestTransport, Transport, TransportError};
