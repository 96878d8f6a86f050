//! Ingestion of individual `.eml` files (RFC 5322 messages without MBOX framing).
//!
//! Forwarded mail lands here; the result is a [`RawMessage`] that goes through
//! the same pipeline as rows exported from the store.

use std::path::Path;

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, PartType};
use tracing::{debug, warn};

use crate::error::{InboxError, Result};
use crate::model::raw::{Channel, EmailHeaders, RawMessage};
use crate::parser::header;

/// Read an `.eml` file; the file stem becomes the message id.
pub fn ingest_eml_file(path: impl AsRef<Path>) -> Result<RawMessage> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| InboxError::io(path, e))?;
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    raw_message_from_eml(&data, &id).inspect_err(|e| {
        warn!(path = %path.display(), error = %e, "Skipping unreadable message");
    })
}

/// Convert RFC 5322 bytes into a [`RawMessage`].
///
/// The header block is stored verbatim as [`EmailHeaders::Raw`] so threading
/// ids are recovered by the normal header extraction. The HTML body is
/// preferred over the text body.
pub fn raw_message_from_eml(data: &[u8], id: &str) -> Result<RawMessage> {
    let data = strip_bom(data);
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(InboxError::InvalidEml(format!("{id}: empty message")));
    }

    let header_end = find_header_end(data).unwrap_or(data.len());
    let header_text = decode_bytes(&data[..header_end]);
    let pairs = header::unfold_headers(&header_text);
    if pairs.is_empty() {
        return Err(InboxError::InvalidEml(format!("{id}: no header block")));
    }

    let parsed = MessageParser::default().parse(data);
    let (content, content_type) = match &parsed {
        Some(msg) => {
            // body_html() would render a text-only message as HTML; only take
            // a real HTML part.
            let html = msg.html_part(0).and_then(|part| match &part.body {
                PartType::Html(html) => Some(html.to_string()),
                _ => None,
            });
            if let Some(html) = html {
                (html, "text/html")
            } else {
                let text = msg.body_text(0).map(|t| t.into_owned()).unwrap_or_default();
                (text, "text/plain")
            }
        }
        None => {
            debug!(id, "mail-parser rejected message, splitting body by hand");
            (body_fallback(data, header_end), "text/plain")
        }
    };

    let created_at = header::header_value(&pairs, "date")
        .and_then(header::parse_date)
        .or_else(|| {
            parsed
                .as_ref()
                .and_then(|m| m.date())
                .and_then(|d| DateTime::parse_from_rfc3339(&d.to_rfc3339()).ok())
                .map(|d| d.with_timezone(&Utc))
        })
        .unwrap_or_default();

    let subject = header::header_value(&pairs, "subject").map(header::decode_encoded_words);

    let mut raw = RawMessage::new(id, created_at, content);
    raw.content_type = Some(content_type.to_string());
    raw.email_headers = Some(EmailHeaders::Raw { raw: header_text });
    raw.email_subject = subject;
    raw.channel = Channel::Email;
    Ok(raw)
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// UTF-8 if valid, else Windows-1252 (the usual culprit in legacy headers).
fn decode_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Everything after the blank line that ends the headers.
fn body_fallback(data: &[u8], header_end: usize) -> String {
    let rest = &data[header_end.min(data.len())..];
    let body = rest
        .strip_prefix(b"\r\n\r\n")
        .or_else(|| rest.strip_prefix(b"\n\n"))
        .unwrap_or(rest);
    decode_bytes(body)
}

/// Find the byte offset where headers end (position of the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i);
        }
        if data[i..].starts_with(b"\r\n\r\n") {
            return Some(i);
        }
    }
    None
}
