//! Quote splitting for plain-text bodies.

use tracing::debug;

use crate::model::quote::{QuoteKind, QuotedBlock, QuotedMessage};
use crate::parser::attribution;
use crate::parser::patterns;
use crate::parser::quote::ParsedEmail;

/// Normalize line endings and non-breaking spaces; strip trailing whitespace.
pub fn normalize_text(content: &str) -> String {
    content
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(['\u{a0}', '\u{202f}'], " ")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_angle_quoted(line: &str) -> bool {
    line.trim_start().starts_with('>')
}

/// Split a plain-text body at the first quote header or `>` line.
pub fn parse_plain(content: &str) -> ParsedEmail {
    let text = normalize_text(content);
    let lines: Vec<&str> = text.lines().collect();

    let split = lines.iter().enumerate().find_map(|(i, line)| {
        if patterns::quote_header_at(&lines, i) {
            Some((i, QuoteKind::Header))
        } else if is_angle_quoted(line) {
            Some((i, QuoteKind::Plain))
        } else {
            None
        }
    });

    let Some((at, kind)) = split else {
        return ParsedEmail {
            visible_content: text.trim().to_string(),
            ..ParsedEmail::default()
        };
    };

    debug!(line = at, ?kind, "Plain-text quote found");

    let visible = lines[..at]
        .iter()
        .filter(|l| !is_angle_quoted(l))
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    let tail = &lines[at..];

    let quoted_messages = if kind == QuoteKind::Header {
        quoted_message_from_lines(tail).into_iter().collect()
    } else {
        Vec::new()
    };

    ParsedEmail {
        visible_content: visible.trim().to_string(),
        quoted_blocks: vec![QuotedBlock {
            kind,
            raw: tail.join("\n"),
        }],
        quoted_messages,
        is_html: false,
    }
}

/// Recover the quoted message that starts with an attribution.
///
/// The body is the first quoting level: one `>` is removed and deeper
/// levels are dropped. Unquoted text after a field block is kept as is.
pub fn quoted_message_from_lines(lines: &[&str]) -> Option<QuotedMessage> {
    let (attribution, used) = attribution::find_attribution(lines)?;
    if attribution.from.is_empty() {
        return None;
    }

    let mut body = Vec::new();
    for line in lines.iter().skip(used) {
        let trimmed = line.trim_start();
        match trimmed.strip_prefix('>') {
            Some(rest) => {
                if rest.trim_start().starts_with('>') {
                    continue;
                }
                body.push(rest.strip_prefix(' ').unwrap_or(rest));
            }
            None => body.push(line),
        }
    }

    Some(QuotedMessage {
        from: attribution.from,
        sent_at: attribution.sent_at,
        subject: attribution.subject,
        html: None,
        text: body.join("\n").trim().to_string(),
    })
}
