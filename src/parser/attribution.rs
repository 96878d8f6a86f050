//! Sender/date recovery from quote headers ("On ... wrote:", Outlook field
//! blocks), used to turn a quoted fragment into a [`QuotedMessage`].
//!
//! [`QuotedMessage`]: crate::model::quote::QuotedMessage

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::model::address::EmailAddress;
use crate::parser::header::{decode_encoded_words, parse_date};
use crate::parser::patterns;

/// Who sent a quoted message, and when.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribution {
    pub from: EmailAddress,
    pub sent_at: Option<DateTime<Utc>>,
    pub subject: Option<String>,
}

/// Localized "wrote:" lines. `rest` holds date and sender mixed together;
/// `who` is present when the language puts the sender after the verb.
static WROTE_LINES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^on\s+(?P<rest>.+?)\s*wrote:$",
        r"(?i)^den\s+(?P<rest>.+?)\s*skrev\s*(?P<who>.*?)\s*:$",
        r"(?i)^am\s+(?P<rest>.+?)\s+schrieb\s+(?P<who>.*?)\s*:$",
        r"(?i)^le\s+(?P<rest>.+?)\s*a écrit\s?:$",
        r"(?i)^el\s+(?P<rest>.+?)\s*escribió:$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid attribution pattern"))
    .collect()
});

/// `Name <email>`; the name part is optional and may be quoted.
static ANGLE_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<name>"[^"]*"|[^<>,"]*?)\s*<(?P<email>[^<>\s]+@[^<>\s]+)>"#)
        .expect("valid address pattern")
});

static BARE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email pattern")
});

/// Last time-of-day or year token of a date phrase; the sender name starts
/// right after it.
static DATE_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d{1,2}[:.]\d{2}(?::\d{2})?(?:\s?[ap]\.?m\.?)?(?:\s?(?:gmt|utc)?\s?[+-]\d{1,2}(?::?\d{2})?)?|\b\d{4}\b)",
    )
    .expect("valid date tail pattern")
});

/// `[mailto:jane@co.com]` as printed by Outlook.
static MAILTO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[mailto:(?P<email>[^\]\s]+)\]").expect("valid mailto pattern")
});

/// Parse a single localized "wrote:" line.
pub fn parse_wrote_line(line: &str) -> Option<Attribution> {
    let trimmed = line.trim();
    for re in WROTE_LINES.iter() {
        let Some(caps) = re.captures(trimmed) else {
            continue;
        };
        let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
        let who = caps
            .name("who")
            .map(|m| m.as_str().trim())
            .filter(|w| !w.is_empty());

        return Some(match who {
            Some(who) => Attribution {
                from: EmailAddress::parse(&decode_encoded_words(who)),
                sent_at: parse_date(&clean_date_phrase(rest)),
                subject: None,
            },
            None => split_date_and_sender(rest),
        });
    }
    None
}

/// Split "Mon, Jan 1, 2024 at 10:00 AM Jane <jane@co.com>" into date and sender.
fn split_date_and_sender(rest: &str) -> Attribution {
    if let Some(caps) = ANGLE_ADDRESS.captures_iter(rest).last() {
        let email = caps.name("email").map(|m| m.as_str()).unwrap_or("");
        // The lazy name capture runs into the date; cut everything before the
        // bracket at the last time or year token.
        let name_end = caps.name("name").map(|m| m.end()).unwrap_or(0);
        let (date_part, name_part) = split_at_date_tail(&rest[..name_end]);
        let name = name_part.trim().trim_matches(',').trim().trim_matches('"');
        let raw = if name.is_empty() {
            format!("<{email}>")
        } else {
            format!("{name} <{email}>")
        };
        return Attribution {
            from: EmailAddress::parse(&decode_encoded_words(&raw)),
            sent_at: parse_date(&clean_date_phrase(date_part)),
            subject: None,
        };
    }

    if let Some(m) = BARE_EMAIL.find_iter(rest).last() {
        let (date_part, _) = split_at_date_tail(&rest[..m.start()]);
        return Attribution {
            from: EmailAddress::parse(m.as_str()),
            sent_at: parse_date(&clean_date_phrase(date_part)),
            subject: None,
        };
    }

    // No address at all; whatever is there is treated as the date.
    Attribution {
        from: EmailAddress::default(),
        sent_at: parse_date(&clean_date_phrase(rest)),
        subject: None,
    }
}

/// Split after the last time-of-day or year token.
fn split_at_date_tail(s: &str) -> (&str, &str) {
    match DATE_TAIL.find_iter(s).last() {
        Some(m) => (&s[..m.end()], &s[m.end()..]),
        None => ("", s),
    }
}

/// Drop connective words and punctuation around a date phrase.
fn clean_date_phrase(s: &str) -> String {
    let trimmed = s.trim().trim_matches(',').trim();
    let lower = trimmed.to_lowercase();
    for suffix in [" at", " um", " kl.", " à"] {
        if lower.ends_with(suffix) {
            if let Some(head) = trimmed.get(..trimmed.len() - suffix.len()) {
                return head.trim().to_string();
            }
        }
    }
    trimmed.to_string()
}

/// Parse an Outlook-style field block (`From:`, `Sent:`, `Subject:` lines).
///
/// Returns the attribution and how many lines it spans. Requires a sender
/// line within the first lines.
pub fn parse_field_block(lines: &[&str]) -> Option<(Attribution, usize)> {
    let mut attribution = Attribution::default();
    let mut seen_from = false;
    let mut consumed = 0;

    for (idx, line) in lines.iter().enumerate().take(12) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if seen_from {
                break;
            }
            continue;
        }
        let Some((name, value)) = trimmed.split_once(':') else {
            if seen_from {
                break;
            }
            continue;
        };
        let value = value.trim();
        match name.trim().to_lowercase().as_str() {
            "from" | "fra" | "von" | "de" => {
                attribution.from = parse_sender_field(value);
                seen_from = true;
            }
            "sent" | "sendt" | "date" | "dato" | "gesendet" | "envoyé" => {
                attribution.sent_at = parse_date(value);
            }
            "subject" | "emne" | "betreff" | "objet" | "asunto" => {
                if !value.is_empty() {
                    attribution.subject = Some(decode_encoded_words(value));
                }
            }
            "to" | "til" | "an" | "à" | "para" | "cc" | "kopi" => {}
            _ => {
                if seen_from {
                    break;
                }
                continue;
            }
        }
        consumed = idx + 1;
    }

    if seen_from {
        Some((attribution, consumed))
    } else {
        None
    }
}

fn parse_sender_field(value: &str) -> EmailAddress {
    let value = MAILTO.replace(value, "<$email>");
    EmailAddress::parse(&decode_encoded_words(value.trim()))
}

/// Find the attribution at the top of a quoted fragment.
///
/// Separator rules ("-----Original Message-----", underscores) are skipped.
/// Returns the attribution and the number of lines it occupies (including
/// skipped separators).
pub fn find_attribution(lines: &[&str]) -> Option<(Attribution, usize)> {
    let mut start = 0;
    while start < lines.len()
        && (lines[start].trim().is_empty() || patterns::is_separator_line(lines[start]))
    {
        start += 1;
    }
    let first = lines.get(start)?;

    if let Some(attribution) = parse_wrote_line(first) {
        return Some((attribution, start + 1));
    }
    if let Some(joined) = patterns::joined_attribution(lines, start) {
        if let Some(attribution) = parse_wrote_line(&joined) {
            return Some((attribution, start + 2));
        }
    }
    parse_field_block(&lines[start..]).map(|(attribution, used)| (attribution, start + used))
}
