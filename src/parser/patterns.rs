//! Static heuristic tables: quote-header patterns and quote-container selectors.
//!
//! These are constant lookup data. Patterns are evaluated against a single
//! trimmed line unless stated otherwise.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::quote::QuoteKind;

// ── Quote headers ───────────────────────────────────────────────────

/// One-line quote headers, localized.
static QUOTE_HEADER_LINES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // English: "On Mon, Jan 1, 2024 at 10:00 AM Jane <jane@co.com> wrote:"
        r"(?i)^on\b.+\bwrote:$",
        r"(?i)^-{2,}\s*original message\s*-{2,}$",
        r"(?i)^-{2,}\s*forwarded message\s*-{2,}$",
        r"(?i)^begin forwarded message:$",
        // Norwegian: "Den 1. jan. 2024 kl. 10:00 skrev Jane <jane@co.com>:"
        r"(?i)^den\b.+\bskrev\b.*:$",
        r"(?i)^-{2,}\s*(opprinnelig melding|videresendt melding)\s*-{2,}$",
        // Outlook headers collapsed onto one line
        r"(?i)^fra:.+\bsendt:.+\btil:.+\bemne:",
        r"(?i)^from:.+\bsent:.+\bto:.+\bsubject:",
        // German
        r"(?i)^am\b.+\bschrieb\b.*:$",
        // French
        r"(?i)^le\b.+\ba écrit\s?:$",
        // Spanish
        r"(?i)^el\b.+\bescribió:$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid quote header pattern"))
    .collect()
});

/// First line of a field block ("From: Jane <jane@co.com>").
static FIELD_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(from|fra|von|de)\s?:\s*\S").expect("valid field pattern")
});

/// Date line of a field block.
static FIELD_SENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(sent|sendt|date|dato|gesendet|envoyé)\s?:").expect("valid field pattern")
});

/// Outlook plain-text separator rule.
static UNDERSCORE_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_{10,}$").expect("valid rule pattern"));

/// Generic tag sniff. A tag name must be followed by whitespace, `/` or `>`,
/// so bracketed addresses like `<jane@co.com>` do not count as markup.
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?[a-z][a-z0-9]*(?:\s[^<>]*)?/?>").expect("valid tag pattern")
});

/// How many lines after a `From:` line a `Sent:` line may appear.
const FIELD_WINDOW: usize = 3;

/// `true` if the trimmed line is a one-line quote header.
pub fn is_quote_header_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && QUOTE_HEADER_LINES.iter().any(|re| re.is_match(trimmed))
}

/// Join a wrapped "On ... \n ... wrote:" attribution split over two lines.
///
/// Returns the joined line when `lines[i]` starts such an attribution.
pub fn joined_attribution(lines: &[&str], i: usize) -> Option<String> {
    let first = lines.get(i)?.trim();
    let second = lines.get(i + 1)?.trim();
    if first.is_empty() || second.is_empty() || is_quote_header_line(first) {
        return None;
    }
    let joined = format!("{first} {second}");
    if is_quote_header_line(&joined) && starts_attribution_word(first) {
        Some(joined)
    } else {
        None
    }
}

fn starts_attribution_word(line: &str) -> bool {
    let lower = line.to_lowercase();
    ["on ", "den ", "am ", "le ", "el "]
        .iter()
        .any(|w| lower.starts_with(w))
}

/// `true` for a `From:` / `Fra:` field line.
pub fn is_field_from_line(line: &str) -> bool {
    FIELD_FROM.is_match(line.trim())
}

/// `true` if `lines[i]` opens a `From:` / `Sent:` field block.
pub fn is_field_block_start(lines: &[&str], i: usize) -> bool {
    let Some(first) = lines.get(i) else {
        return false;
    };
    if !is_field_from_line(first) {
        return false;
    }
    lines
        .iter()
        .skip(i + 1)
        .take(FIELD_WINDOW)
        .any(|l| FIELD_SENT.is_match(l.trim()))
}

/// `true` if a quote header of any form begins at `lines[i]`.
pub fn quote_header_at(lines: &[&str], i: usize) -> bool {
    let Some(line) = lines.get(i) else {
        return false;
    };
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    if is_quote_header_line(trimmed) || joined_attribution(lines, i).is_some() {
        return true;
    }
    if is_field_block_start(lines, i) {
        return true;
    }
    if UNDERSCORE_RULE.is_match(trimmed) {
        let next = lines
            .iter()
            .enumerate()
            .skip(i + 1)
            .find(|(_, l)| !l.trim().is_empty())
            .map(|(idx, _)| idx);
        if let Some(next) = next {
            return is_field_block_start(lines, next);
        }
    }
    false
}

/// `true` for separator lines that may precede a field block.
pub fn is_separator_line(line: &str) -> bool {
    let trimmed = line.trim();
    UNDERSCORE_RULE.is_match(trimmed)
        || (trimmed.starts_with("--") && trimmed.ends_with("--") && trimmed.len() > 4)
        || trimmed.eq_ignore_ascii_case("begin forwarded message:")
}

/// Best-effort HTML sniff for content stored without a usable content type.
pub fn looks_like_html(content: &str) -> bool {
    HTML_TAG.is_match(content)
}

// ── Quote containers ────────────────────────────────────────────────

/// Selector list for one quoting origin.
pub struct QuoteOrigin {
    pub kind: QuoteKind,
    pub selectors: &'static str,
}

/// Origins in the order they are removed. Earlier origins win when
/// containers nest.
pub const QUOTE_ORIGINS: &[QuoteOrigin] = &[
    QuoteOrigin {
        kind: QuoteKind::Gmail,
        selectors: "div.gmail_quote_container, div.gmail_quote, blockquote.gmail_quote, div.gmail_extra",
    },
    QuoteOrigin {
        kind: QuoteKind::Outlook,
        selectors: "#divRplyFwdMsg, #appendonsend, div.OutlookMessageHeader, #mail-editor-reference-message-container",
    },
    QuoteOrigin {
        kind: QuoteKind::Apple,
        selectors: "blockquote[type=cite], div.AppleOriginalContents",
    },
    QuoteOrigin {
        kind: QuoteKind::Yahoo,
        selectors: "div.yahoo_quoted, div[id^=yahoo_quoted]",
    },
    QuoteOrigin {
        kind: QuoteKind::Blockquote,
        selectors: "blockquote",
    },
];

/// Separator colours Outlook uses on the reply-header border.
const OUTLOOK_BORDER_COLOURS: &[&str] = &["#e1e1e1", "#b5c4df"];

/// Outlook marks its reply header with a solid top border in a fixed colour.
pub fn is_outlook_border_style(style: &str) -> bool {
    let normalized: String = style
        .to_ascii_lowercase()
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect();
    normalized.contains("border-top:solid")
        && OUTLOOK_BORDER_COLOURS
            .iter()
            .any(|colour| normalized.contains(colour))
}
