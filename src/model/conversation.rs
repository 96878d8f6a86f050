//! Conversation summaries and their thread-grouped form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Customer fields the threader reads from a conversation row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationCustomer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A conversation row. Fields the threader does not read are carried
/// through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<ConversationCustomer>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConversationSummary {
    /// `received_at`, falling back to `updated_at`.
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.received_at.unwrap_or(self.updated_at)
    }

    /// Trimmed, lower-cased customer email.
    pub fn customer_email(&self) -> Option<String> {
        self.customer
            .as_ref()
            .and_then(|c| c.email.as_deref())
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }
}

/// A thread representative with the metadata the inbox list needs to
/// expand the thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadedConversation {
    #[serde(flatten)]
    pub conversation: ConversationSummary,
    pub thread_count: usize,
    /// Every conversation id in the thread, most recent first.
    pub thread_ids: Vec<String>,
    pub is_thread_representative: bool,
}
