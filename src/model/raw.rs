//! Raw message records as delivered by the data store.
//!
//! These types are read-only input. Field names follow the store's JSON
//! rows so exports can be deserialized directly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel a message arrived on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Email,
    Sms,
    Voice,
    Chat,
    #[serde(other)]
    Other,
}

impl Channel {
    /// Channels whose sender identity is a phone number.
    pub fn is_phone(self) -> bool {
        matches!(self, Self::Sms | Self::Voice)
    }
}

/// One `{name, value}` header entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderPair {
    pub name: String,
    pub value: String,
}

/// Email headers in any of the shapes providers hand us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmailHeaders {
    /// `[{"name": "Message-ID", "value": "<a@b>"}, ...]`
    Pairs(Vec<HeaderPair>),
    /// `{"raw": "Message-ID: <a@b>\r\nReferences: ..."}`
    Raw { raw: String },
    /// A bare folded header block.
    Text(String),
    /// `{"Message-ID": "<a@b>", "References": ["<x>", "<y>"]}`
    Map(BTreeMap<String, serde_json::Value>),
}

/// Customer attached to a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Conversation a message belongs to, as joined by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerRef>,
}

impl ConversationRef {
    /// Lower-cased customer email, if the conversation carries one.
    pub fn customer_email(&self) -> Option<String> {
        self.customer
            .as_ref()
            .and_then(|c| c.email.as_deref())
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }
}

/// A message row exactly as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub content: String,
    /// MIME-like content type (`text/html`, `text/plain; charset=utf-8`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_headers: Option<EmailHeaders>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,
    /// `"agent"`, `"customer"`, ... as recorded by the writer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_type: Option<String>,
    #[serde(default)]
    pub is_internal: bool,
    #[serde(default)]
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    /// Provider-side identifier (webhook event id, Graph id, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationRef>,
}

impl RawMessage {
    /// Minimal email record, mostly useful for tests and ingestion.
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at,
            content: content.into(),
            content_type: None,
            email_headers: None,
            email_subject: None,
            sender_type: None,
            is_internal: false,
            channel: Channel::Email,
            customer_phone: None,
            external_id: None,
            conversation: None,
        }
    }

    /// Lower-cased customer email of the owning conversation.
    pub fn customer_email(&self) -> Option<String> {
        self.conversation.as_ref().and_then(|c| c.customer_email())
    }
}
