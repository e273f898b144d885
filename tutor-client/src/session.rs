//! Chat session: the active subject, its log, the key ring and a pending image.
//!
//! Mutating operations take `&mut self`, so one session can only have one
//! exchange in flight and its log is never appended to concurrently.

use std::sync::Arc;

use thiserror::Error;
use tutor_common::config::TutorConfig;
use tutor_common::util::redact_keys;
use tutor_common::Error;

use crate::api::{ApiError, ChatMode, ChatPayload, ChatReply, TutorApi};
use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::history::{ConversationLog, ConversationStore};
use crate::image::ImageAttachment;
use crate::keys::ApiKeyring;
use crate::storage::KeyValueStore;
use crate::subject::Subject;
use crate::transport::TransportError;

/// Message sent to open a quiz.
pub const QUIZ_PROMPT: &str = "Start smart quiz";

/// Error from a session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Rejected before any request was sent
    #[error(transparent)]
    Input(#[from] Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Input(e) if e.is_invalid_input())
    }
}

/// User-facing text for a failed operation, e.g. `failure_message("send message", &err)`.
pub fn failure_message(action: &str, err: &SessionError) -> String {
    if err.is_validation() {
        return err.to_string();
    }
    format!("Failed to {action}: {err}. Please check network or API key settings.")
}

pub struct ChatSession {
    api: TutorApi,
    history: ConversationStore,
    keys: ApiKeyring,
    image: Option<ImageAttachment>,
}

impl ChatSession {
    pub fn new(api: TutorApi, history: ConversationStore, keys: ApiKeyring) -> Self {
        Self {
            api,
            history,
            keys,
            image: None,
        }
    }

    /// Build a session over reqwest from configuration and a store.
    pub fn from_config(
        config: &TutorConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, TransportError> {
        let dispatcher = Dispatcher::with_reqwest(DispatchConfig::from(&config.backend))?;
        let api = TutorApi::new(config.backend.base_url.clone(), dispatcher);
        let history = ConversationStore::new(store.clone(), &config.history);
        Ok(Self::new(api, history, ApiKeyring::new(store)))
    }

    pub fn api(&self) -> &TutorApi {
        &self.api
    }

    pub fn keys(&self) -> &ApiKeyring {
        &self.keys
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.history.active_subject()
    }

    /// The active subject's log.
    pub fn log(&self) -> &ConversationLog {
        self.history.log()
    }

    pub fn pending_image(&self) -> Option<&ImageAttachment> {
        self.image.as_ref()
    }

    /// Select a subject and load its persisted history.
    pub fn select_subject(&mut self, name: &str) -> Result<&ConversationLog, SessionError> {
        let subject = Subject::parse(name)?;
        Ok(self.history.switch_subject(&subject))
    }

    pub fn attach_image(&mut self, image: ImageAttachment) {
        self.image = Some(image);
    }

    pub fn clear_image(&mut self) {
        self.image = None;
    }

    /// Forget the active subject's history.
    pub fn clear_history(&mut self) -> Result<(), SessionError> {
        let subject = self.require_subject()?;
        self.history.clear(&subject);
        Ok(())
    }

    fn require_subject(&self) -> Result<Subject, SessionError> {
        self.history
            .active_subject()
            .cloned()
            .ok_or_else(|| Error::invalid("Please select a subject first").into())
    }

    /// Send a chat message, with the pending image if one is attached.
    ///
    /// The pending image is consumed once the request is issued. On success
    /// the exchange is recorded; on failure the log is left untouched.
    pub async fn send_message(&mut self, text: &str) -> Result<ChatReply, SessionError> {
        let message = text.trim();
        if message.is_empty() && self.image.is_none() {
            return Err(Error::invalid("Please enter a message or upload an image").into());
        }
        let subject = self.require_subject()?;
        let image = self.image.take();

        let payload = ChatPayload {
            message: message.to_string(),
            api_keys: self.keys.values(),
            mode: ChatMode::Chat,
            conversation_history: self.history.log().to_vec(),
            image: image.as_ref().map(|i| i.data_url().to_string()),
            image_filename: image.as_ref().map(|i| i.filename().to_string()),
        };

        tracing::debug!(
            subject = %subject,
            history = payload.conversation_history.len(),
            with_image = image.is_some(),
            "Sending message"
        );

        let reply = match &image {
            Some(_) => self.api.process_image(&subject, &payload).await,
            None => self.api.chat(&subject, &payload).await,
        };
        let reply = reply.map_err(|e| {
            tracing::warn!(
                subject = %subject,
                error = %redact_keys(&e.to_string(), &payload.api_keys),
                "Send message failed"
            );
            e
        })?;

        self.history
            .append_exchange(&subject, message, image.is_some(), &reply.response);
        Ok(reply)
    }

    /// Ask the backend to open a quiz for the active subject.
    ///
    /// Quiz requests start from an empty history. The exchange is recorded
    /// only when the backend returns a non-empty response.
    pub async fn start_quiz(&mut self) -> Result<ChatReply, SessionError> {
        let subject = self.require_subject()?;
        let payload = ChatPayload {
            message: QUIZ_PROMPT.to_string(),
            api_keys: self.keys.values(),
            mode: ChatMode::Quiz,
            conversation_history: Vec::new(),
            image: None,
            image_filename: None,
        };

        let reply = self.api.chat(&subject, &payload).await.map_err(|e| {
            tracing::warn!(
                subject = %subject,
                error = %redact_keys(&e.to_string(), &payload.api_keys),
                "Start quiz failed"
            );
            e
        })?;

        if !reply.response.is_empty() {
            self.history
                .append_exchange(&subject, QUIZ_PROMPT, false, &reply.response);
        }
        Ok(reply)
    }
}
