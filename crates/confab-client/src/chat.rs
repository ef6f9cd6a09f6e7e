//! Typed surface for the chat backend REST API.

use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::{ApiRequest, CallOverrides, Transport, TransportResult};

/// A persistent chat thread.
///
/// Sessions are observed and deleted from the client, never created here;
/// the list arrives as a full-replace snapshot on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    /// Opaque user-scoped inputs; structure is decided by the backend app.
    #[serde(default)]
    pub inputs: Map<String, Value>,
    pub status: String,
    /// Opening line shown for a fresh conversation.
    #[serde(default)]
    pub introduction: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One query/answer pair belonging to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    pub query: String,
    pub answer: String,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Value>,
}

/// Paged list envelope common to conversations and messages.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    /// Missing `data` means an empty page.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    pub has_more: bool,
    /// Echoed page size; the server clamps out-of-range requests.
    pub limit: u32,
}

/// Sort orders accepted by the conversation list; a leading `-` means
/// descending. The server default is `-updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortBy {
    #[serde(rename = "created_at")]
    CreatedAt,
    #[serde(rename = "-created_at")]
    CreatedAtDesc,
    #[serde(rename = "updated_at")]
    UpdatedAt,
    #[serde(rename = "-updated_at")]
    UpdatedAtDesc,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationQuery {
    /// Id of the last record on the previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<String>,
    /// Page size, 1–100, server default 20.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageQuery {
    pub conversation_id: String,
    /// Id of the first record on the current page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Like,
    Dislike,
}

/// Message feedback; `rating: None` serializes to `null` and revokes a
/// previous rating, so the field is always present on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRequest {
    pub rating: Option<Rating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
    pub result: String,
}

/// Suggested follow-up questions for a message.
#[derive(Debug, Clone, Deserialize)]
pub struct Suggestions {
    pub result: String,
    #[serde(default)]
    pub data: Vec<String>,
}

#[derive(Serialize)]
struct RenameRequest<'a> {
    name: &'a str,
}

/// Chat API surface: factory-built request functions for the paged and
/// parameterized endpoints, direct transport calls for the rest.
pub struct ChatApi {
    transport: Arc<Transport>,
    pub conversations: ApiRequest<ConversationQuery, Page<Session>>,
    pub messages: ApiRequest<MessageQuery, Page<Message>>,
    pub feedback: ApiRequest<FeedbackRequest, Ack>,
}

impl ChatApi {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            conversations: ApiRequest::new(
                Arc::clone(&transport),
                "/chat/conversations",
                Method::GET,
            ),
            messages: ApiRequest::new(Arc::clone(&transport), "/chat/messages", Method::GET),
            feedback: ApiRequest::new(
                Arc::clone(&transport),
                "/chat/messages/:message_id/feedbacks",
                Method::POST,
            ),
            transport,
        }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Renames a conversation, returning the updated session.
    ///
    /// # Errors
    /// Propagates the classified transport failure.
    pub async fn rename_conversation(&self, id: &str, name: &str) -> TransportResult<Session> {
        self.transport
            .post(
                &format!("/chat/conversations/{id}/name"),
                &RenameRequest { name },
            )
            .await
    }

    /// Deletes a conversation.
    ///
    /// # Errors
    /// Propagates the classified transport failure.
    pub async fn delete_conversation(&self, id: &str) -> TransportResult<()> {
        self.transport
            .delete(&format!("/chat/conversations/{id}"))
            .await
    }

    /// Rates a message, or revokes the rating with `rating: None`.
    ///
    /// # Errors
    /// Propagates the classified transport failure.
    pub async fn send_feedback(
        &self,
        message_id: &str,
        request: &FeedbackRequest,
    ) -> TransportResult<Ack> {
        self.feedback
            .call(
                Some(request),
                Some(CallOverrides::path_param("message_id", message_id)),
            )
            .await
    }

    /// Fetches suggested follow-up questions for a message.
    ///
    /// # Errors
    /// Propagates the classified transport failure.
    pub async fn fetch_suggestions(&self, message_id: &str) -> TransportResult<Suggestions> {
        self.transport
            .get(&format!("/chat/messages/{message_id}/suggested"))
            .await
    }
}
