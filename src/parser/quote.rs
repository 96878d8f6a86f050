//! Split a message body into the part the author wrote and the quoted history.
//!
//! HTML bodies go through a DOM pass ([`quote_html`](super::quote_html));
//! everything else through line heuristics ([`quote_text`](super::quote_text)).
//! Neither path fails: without recognisable markers the whole body is visible.

use serde::{Deserialize, Serialize};

use crate::model::quote::{QuotedBlock, QuotedMessage};
use crate::parser::{patterns, quote_html, quote_text};

/// Result of quote splitting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEmail {
    /// Body with quoted history removed (HTML or text, matching the input).
    pub visible_content: String,
    /// Removed fragments, in detection order.
    pub quoted_blocks: Vec<QuotedBlock>,
    /// Earlier messages recovered from the removed fragments.
    pub quoted_messages: Vec<QuotedMessage>,
    pub is_html: bool,
}

/// `true` when the body should be treated as HTML.
pub fn is_html_content(content: &str, content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("html"))
        || patterns::looks_like_html(content)
}

/// Split `content` into visible text and quoted blocks.
pub fn parse_quoted_email(content: &str, content_type: Option<&str>) -> ParsedEmail {
    if content.trim().is_empty() {
        return ParsedEmail {
            is_html: content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("html")),
            ..ParsedEmail::default()
        };
    }
    if is_html_content(content, content_type) {
        quote_html::parse_html(content)
    } else {
        quote_text::parse_plain(content)
    }
}
