//! Chat messages and per-conversation history.

pub mod assistant;

pub use assistant::{Answer, Assistant};

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::respond::GenerationPath;
use crate::search::QueryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageMetadata {
    pub confidence: f32,
    pub sources: Vec<String>,
    pub escalate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<String>,
    pub suggestions: Vec<String>,
    pub intent_type: String,
    pub generation_path: GenerationPath,
    /// Retrieval result the answer is grounded on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_result: Option<QueryResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl ChatMessage {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn user(content: &str) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: &str, metadata: MessageMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::new(Role::Assistant, content)
        }
    }
}

/// Append-only message history keyed by `(user_id, session_id)`.
#[derive(Debug, Default)]
pub struct ConversationLog {
    conversations: RwLock<HashMap<(String, String), Vec<ChatMessage>>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, user_id: &str, session_id: &str, message: ChatMessage) {
        self.conversations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry((user_id.to_string(), session_id.to_string()))
            .or_default()
            .push(message);
    }

    /// Messages of one conversation in the order they were appended.
    pub fn history(&self, user_id: &str, session_id: &str) -> Vec<ChatMessage> {
        self.conversations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(user_id.to_string(), session_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Session ids `user_id` has talked in, sorted.
    pub fn sessions(&self, user_id: &str) -> Vec<String> {
        let mut sessions: Vec<String> = self
            .conversations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .filter(|(user, _)| user == user_id)
            .map(|(_, session)| session.clone())
            .collect();
        sessions.sort();
        sessions
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
