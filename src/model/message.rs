//! The canonical, channel-agnostic message handed to renderers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::EmailAddress;
use super::quote::{QuotedBlock, QuotedMessage};
use super::raw::{Channel, RawMessage};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorType {
    Agent,
    Customer,
    /// Accepted when reading stored data; the normalizer never assigns it.
    System,
}

impl AuthorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Customer => "customer",
            Self::System => "system",
        }
    }
}

/// Message direction relative to the support organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl From<AuthorType> for Direction {
    /// Direction is fully determined by authorship.
    fn from(author: AuthorType) -> Self {
        match author {
            AuthorType::Agent => Self::Outbound,
            AuthorType::Customer | AuthorType::System => Self::Inbound,
        }
    }
}

/// A normalized message, built once per raw record and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    /// Inherited from the raw record (or `<parent>::q<n>` for quoted cards).
    pub id: String,

    /// `id:<explicit>` or `ch:<hash>`; see [`crate::normalize::dedup`].
    pub dedup_key: String,

    pub created_at: DateTime<Utc>,
    pub channel: Channel,

    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<Vec<EmailAddress>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcc: Option<Vec<EmailAddress>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    pub direction: Direction,
    pub author_type: AuthorType,
    pub author_label: String,
    pub avatar_initial: String,

    /// Body with quoted history stripped (HTML when `is_html`).
    pub visible_body: String,
    pub is_html: bool,

    /// One entry per detected quote container or section, in document order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_blocks: Option<Vec<QuotedBlock>>,

    /// Back-reference to the input record.
    pub original_message: RawMessage,

    /// Sub-messages recovered from quote containers; only read by the
    /// segmenter.
    #[serde(skip)]
    pub(crate) quoted_messages: Vec<QuotedMessage>,
}

impl NormalizedMessage {
    /// Quoted sub-messages recovered during quote extraction.
    pub fn quoted_messages(&self) -> &[QuotedMessage] {
        &self.quoted_messages
    }

    pub fn is_agent(&self) -> bool {
        self.author_type == AuthorType::Agent
    }
}
