//! Quoted-history fragments split out of message bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::EmailAddress;

/// Which heuristic recognised a quoted fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteKind {
    Gmail,
    Outlook,
    Apple,
    Yahoo,
    Blockquote,
    /// A localized "wrote:" / "Original Message" style header line.
    Header,
    /// `>`-prefixed plain-text lines.
    Plain,
}

/// A detected fragment of previously-sent content.
///
/// `raw` is the untouched matched fragment (outer HTML for DOM matches,
/// text otherwise) so a "show full history" view can render it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedBlock {
    pub kind: QuoteKind,
    pub raw: String,
}

/// One earlier message recovered from a quote container.
///
/// Only the first level of quoting is recovered; quotes nested inside
/// `html`/`text` have already been removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedMessage {
    pub from: EmailAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Body markup when the quote came from an HTML message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Plain-text rendering of the body.
    pub text: String,
}
