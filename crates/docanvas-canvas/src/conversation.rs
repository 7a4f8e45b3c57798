//! Conversation state attached to the chat panel and to knowledge nodes.
//!
//! Messages carry a stable local id so the optimistic user message can be
//! confirmed, rewritten or rolled back by id regardless of what was appended
//! after it.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use docanvas_core::{ChatError, DocumentId, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::selection::SelectionEntry;

/// Assistant text shown when the chat service fails.
pub const CHAT_UNAVAILABLE_PLACEHOLDER: &str = "Chat service unavailable.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Delivery status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Sent, no reply yet.
    Pending,
    #[default]
    Confirmed,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: f64,
    #[serde(rename = "displayText", default, skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
    #[serde(rename = "htmlText", default, skip_serializing_if = "Option::is_none")]
    pub html_text: Option<String>,
    #[serde(default)]
    pub status: MessageStatus,
}

fn now_ms() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: now_ms(),
            display_text: None,
            html_text: None,
            status: MessageStatus::Confirmed,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Text to show in the panel.
    pub fn visible_text(&self) -> &str {
        self.display_text.as_deref().unwrap_or(&self.text)
    }
}

/// Which part of the document is sent as chat context.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContextScope {
    /// Only the selected fragments.
    #[default]
    Selection,
    /// The whole document.
    FullDocument,
    /// A character range of the document, as typed by the user.
    Custom { start: i64, end: i64 },
}

impl ContextScope {
    /// Resolve against a document of `total` characters.
    ///
    /// Custom ranges must satisfy `0 <= start < end <= total`.
    pub fn resolve(&self, total: usize) -> std::result::Result<Option<Range<usize>>, ChatError> {
        match *self {
            ContextScope::Selection => Ok(None),
            ContextScope::FullDocument => Ok(Some(0..total)),
            ContextScope::Custom { start, end } => {
                let invalid = ChatError::InvalidRange { start, end, total };
                if start < 0 || end <= start {
                    return Err(invalid);
                }
                let (start_u, end_u) = match (usize::try_from(start), usize::try_from(end)) {
                    (Ok(s), Ok(e)) => (s, e),
                    _ => return Err(invalid),
                };
                if end_u > total {
                    return Err(invalid);
                }
                Ok(Some(start_u..end_u))
            }
        }
    }
}

/// Payload sent to the chat collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub document_id: DocumentId,
    pub messages: Vec<ChatMessage>,
    pub selected_fragments: Vec<SelectionEntry>,
    pub context_range: Option<Range<usize>>,
    /// Fragment the bound node hangs off, if the panel is bound to one.
    pub source_fragment_id: Option<String>,
}

/// Reply from the chat collaborator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatReply {
    pub reply: String,
    /// Canonical text for the last user message, when the service rewrote it.
    pub first_user_message_override: Option<String>,
}

/// Chat backend.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply>;
}

/// Counter backing the "thinking" indicator.
#[derive(Debug, Clone, Default)]
pub struct ThinkingIndicator(Arc<AtomicUsize>);

impl ThinkingIndicator {
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }

    /// Show the indicator until the returned guard is dropped.
    pub fn show(&self) -> ThinkingGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        ThinkingGuard(self.0.clone())
    }
}

/// Hides the thinking indicator on drop.
#[derive(Debug)]
pub struct ThinkingGuard(Arc<AtomicUsize>);

impl Drop for ThinkingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Messages of the chat panel, optionally bound to a knowledge node.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    bound_node: Option<Uuid>,
    thinking: ThinkingIndicator,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn thinking(&self) -> &ThinkingIndicator {
        &self.thinking
    }

    pub fn bound_node(&self) -> Option<Uuid> {
        self.bound_node
    }

    /// Open a node's conversation in the panel.
    pub fn bind(&mut self, node_id: Uuid, messages: Vec<ChatMessage>) {
        self.bound_node = Some(node_id);
        self.messages = messages;
    }

    /// Detach from the bound node, keeping messages.
    pub fn unbind(&mut self) {
        self.bound_node = None;
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Append an optimistic user message and return its id.
    pub fn push_pending_user(&mut self, text: String, display_text: Option<String>) -> Uuid {
        let mut message = ChatMessage::user(text);
        message.display_text = display_text;
        message.status = MessageStatus::Pending;
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Remove a message by id. Returns false when it is gone already.
    pub fn rollback(&mut self, id: Uuid) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        before != self.messages.len()
    }

    /// Mark a pending message confirmed, applying the canonical text if given.
    pub fn confirm(&mut self, id: Uuid, canonical_text: Option<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.status = MessageStatus::Confirmed;
                if let Some(text) = canonical_text {
                    message.text = text;
                }
                true
            }
            None => false,
        }
    }

    /// Append the placeholder shown for a failed request.
    pub fn push_failure_placeholder(&mut self) {
        self.messages
            .push(ChatMessage::assistant(CHAT_UNAVAILABLE_PLACEHOLDER));
    }

    /// Show free-standing messages, detached from any node.
    pub fn show(&mut self, messages: Vec<ChatMessage>) {
        self.bound_node = None;
        self.messages = messages;
    }

    /// Drop all messages and unbind.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.bound_node = None;
    }
}

/// A named chat thread of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// The chat threads of one document and which one the panel shows.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    chats: Vec<ChatSession>,
    active: Option<Uuid>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chats(&self) -> &[ChatSession] {
        &self.chats
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn active_id(&self) -> Option<Uuid> {
        self.active
    }

    pub fn active(&self) -> Option<&ChatSession> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: Uuid) -> Option<&ChatSession> {
        self.chats.iter().find(|c| c.id == id)
    }

    /// Replace all threads. The first one becomes active.
    pub fn load(&mut self, chats: Vec<ChatSession>) {
        self.active = chats.first().map(|c| c.id);
        self.chats = chats;
    }

    /// Append an empty thread named after its position and make it active.
    pub fn create(&mut self) -> &ChatSession {
        let chat = ChatSession {
            id: Uuid::new_v4(),
            name: format!("Chat {}", self.chats.len() + 1),
            messages: Vec::new(),
        };
        self.active = Some(chat.id);
        self.chats.push(chat);
        &self.chats[self.chats.len() - 1]
    }

    /// Make `id` active. Returns `None` for an unknown id.
    pub fn set_active(&mut self, id: Uuid) -> Option<&ChatSession> {
        let index = self.chats.iter().position(|c| c.id == id)?;
        self.active = Some(id);
        Some(&self.chats[index])
    }

    /// Store panel messages on the active thread and return it.
    pub fn record_active(&mut self, messages: &[ChatMessage]) -> Option<&ChatSession> {
        let id = self.active?;
        let chat = self.chats.iter_mut().find(|c| c.id == id)?;
        chat.messages = messages.to_vec();
        Some(&*chat)
    }

    /// Remove a thread. Removing the active one activates the first left.
    pub fn remove(&mut self, id: Uuid) -> Option<ChatSession> {
        let index = self.chats.iter().position(|c| c.id == id)?;
        let removed = self.chats.remove(index);
        if self.active == Some(id) {
            self.active = self.chats.first().map(|c| c.id);
        }
        Some(removed)
    }
}
