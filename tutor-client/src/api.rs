//! HTTP client for the study-assistant backend.
//!
//! Endpoints:
//! - `POST /api/chat/{subject}` - chat and quiz turns
//! - `POST /api/process_image_with_agent/{subject}` - chat turn with an image
//! - `GET  /api/get_memory/{subject}` - stored learning memory
//! - `GET  /api/get_wrong_questions/{subject}` - wrong-question book
//! - `POST /api/import_memory`, `POST /api/import_wrong_questions` - restore exports
//!
//! Chat and read calls go through the dispatcher's retry loop. Imports are
//! sent once since replaying them could duplicate data on the server.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::dispatch::{DispatchError, DispatchResponse, Dispatcher};
use crate::history::ConversationTurn;
use crate::subject::Subject;
use crate::transport::HttpRequest;

/// Error type for backend API calls.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Dispatch failed (timeout, transport, or HTTP status)
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Response was 2xx but not the expected JSON
    #[error("Failed to parse response: {0}")]
    Decode(String),

    /// Request body could not be encoded
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Conversation mode requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Chat,
    Quiz,
}

/// Body of chat and image requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPayload {
    pub message: String,
    pub api_keys: Vec<String>,
    pub mode: ChatMode,
    pub conversation_history: Vec<ConversationTurn>,
    /// `data:` URL of the attached image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_filename: Option<String>,
}

/// Reply to a chat or image request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default, deserialize_with = "null_as_default")]
    pub response: String,
    /// Text recognized in the attached image, when the backend ran OCR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
}

impl ChatReply {
    /// OCR text, ignoring empty strings.
    pub fn ocr(&self) -> Option<&str> {
        self.ocr_text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct MemoryReply {
    #[serde(default, deserialize_with = "null_as_default")]
    memory: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WrongQuestionsReply {
    #[serde(default, deserialize_with = "null_as_default")]
    wrong_questions: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ImportRequest<'a> {
    subject: &'a str,
    data: &'a serde_json::Value,
}

/// Reply to an import request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportReply {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

/// Backend API client.
#[derive(Clone)]
pub struct TutorApi {
    base_url: String,
    dispatcher: Dispatcher,
}

impl TutorApi {
    /// Create a client for `base_url`; trailing slashes are dropped.
    pub fn new(base_url: impl Into<String>, dispatcher: Dispatcher) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            dispatcher,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decode<T: DeserializeOwned>(response: &DispatchResponse) -> ApiResult<T> {
        response.json().map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Send a chat or quiz turn.
    pub async fn chat(&self, subject: &Subject, payload: &ChatPayload) -> ApiResult<ChatReply> {
        let request = HttpRequest::post_json(self.url(&format!("/api/chat/{subject}")), payload)?;
        let response = self.dispatcher.dispatch(&request).await?;
        Self::decode(&response)
    }

    /// Send a chat turn carrying an image; `payload.image` should be set.
    pub async fn process_image(
        &self,
        subject: &Subject,
        payload: &ChatPayload,
    ) -> ApiResult<ChatReply> {
        let request = HttpRequest::post_json(
            self.url(&format!("/api/process_image_with_agent/{subject}")),
            payload,
        )?;
        let response = self.dispatcher.dispatch(&request).await?;
        Self::decode(&response)
    }

    pub async fn get_memory(&self, subject: &Subject) -> ApiResult<Vec<serde_json::Value>> {
        let request = HttpRequest::get(self.url(&format!("/api/get_memory/{subject}")));
        let response = self.dispatcher.dispatch(&request).await?;
        Ok(Self::decode::<MemoryReply>(&response)?.memory)
    }

    pub async fn get_wrong_questions(
        &self,
        subject: &Subject,
    ) -> ApiResult<Vec<serde_json::Value>> {
        let request = HttpRequest::get(self.url(&format!("/api/get_wrong_questions/{subject}")));
        let response = self.dispatcher.dispatch(&request).await?;
        Ok(Self::decode::<WrongQuestionsReply>(&response)?.wrong_questions)
    }

    pub async fn import_memory(
        &self,
        subject: &Subject,
        data: &serde_json::Value,
    ) -> ApiResult<ImportReply> {
        self.import("/api/import_memory", subject, data).await
    }

    pub async fn import_wrong_questions(
        &self,
        subject: &Subject,
        data: &serde_json::Value,
    ) -> ApiResult<ImportReply> {
        self.import("/api/import_wrong_questions", subject, data)
            .await
    }

    async fn import(
        &self,
        path: &str,
        subject: &Subject,
        data: &serde_json::Value,
    ) -> ApiResult<ImportReply> {
        let body = ImportRequest {
            subject: subject.as_str(),
            data,
        };
        let request = HttpRequest::post_json(self.url(path), &body)?;
        let response = self.dispatcher.dispatch_once(&request).await?;
        Self::decode(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_omits_absent_image_fields() {
        let payload = ChatPayload {
            message: "hello".into(),
            api_keys: vec!["k".into()],
            mode: ChatMode::Chat,
            conversation_history: vec![],
            image: None,
            image_filename: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "message": "hello",
                "api_keys": ["k"],
                "mode": "chat",
                "conversation_history": []
            })
        );
    }

    #[test]
    fn payload_replays_history_in_order() {
        let payload = ChatPayload {
            message: "and 3+3?".into(),
            api_keys: vec![],
            mode: ChatMode::Quiz,
            conversation_history: vec![
                ConversationTurn::user("2+2?"),
                ConversationTurn::assistant("4"),
            ],
            image: Some("data:image/png;base64,AAAA".into()),
            image_filename: Some("sum.png".into()),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(
            r#""conversation_history":[{"role":"user","content":"2+2?"},{"role":"assistant","content":"4"}]"#
        ));
        assert!(json.contains(r#""mode":"quiz""#));
        assert!(json.contains(r#""image_filename":"sum.png""#));
    }

    #[test]
    fn reply_tolerates_missing_fields() {
        let reply: ChatReply = serde_json::from_str("{}").unwrap();
        assert_eq!(reply.response, "");
        assert_eq!(reply.ocr(), None);

        let reply: ChatReply =
            serde_json::from_str(r#"{"response":"x","ocr_text":"  "}"#).unwrap();
        assert_eq!(reply.ocr(), None);
    }

    #[test]
    fn null_fields_read_as_empty() {
        let reply: ChatReply =
            serde_json::from_str(r#"{"response":null,"ocr_text":null}"#).unwrap();
        assert_eq!(reply, ChatReply::default());

        let memory: MemoryReply = serde_json::from_str(r#"{"memory":null}"#).unwrap();
        assert!(memory.memory.is_empty());
        let wrong: WrongQuestionsReply =
            serde_json::from_str(r#"{"wrong_questions":null}"#).unwrap();
        assert!(wrong.wrong_questions.is_empty());
        let import: ImportReply = serde_json::from_str(r#"{"message":null}"#).unwrap();
        assert_eq!(import.message, "");
    }

    #[test]
    fn subject_routes_stay_under_their_endpoint() {
        let api = TutorApi::new(
            "http://localhost:5000",
            Dispatcher::with_reqwest(Default::default()).unwrap(),
        );
        let subject = Subject::parse("cs.graphs").unwrap();
        let url = reqwest::Url::parse(&api.url(&format!("/api/chat/{subject}"))).unwrap();
        assert_eq!(url.path(), "/api/chat/cs.graphs");

        assert!(Subject::parse("..").is_err());
        assert!(Subject::parse(".").is_err());
    }

    #[test]
    fn base_url_trailing_slashes_are_trimmed() {
        let api = TutorApi::new(
            "http://localhost:5000///",
            Dispatcher::with_reqwest(Default::default()).unwrap(),
        );
        assert_eq!(api.base_url(), "http://localhost:5000");
        assert_eq!(api.url("/api/chat/math"), "http://localhost:5000/api/chat/math");
    }
}
