//! Header extraction: shape-agnostic header access, folding, threading ids,
//! encoded-words (RFC 2047) and date parsing.
//!
//! Everything here is total. Header quality from real mail servers is
//! unreliable, so malformed input degrades to absence instead of an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::address::EmailAddress;
use crate::model::raw::EmailHeaders;

/// Threading identifiers of one message, angle brackets stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageIds {
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
}

/// Extract `Message-ID`, `In-Reply-To` and `References` from any header shape.
pub fn extract_message_ids(headers: Option<&EmailHeaders>) -> MessageIds {
    let pairs = header_pairs(headers);

    let message_id = header_value(&pairs, "message-id").and_then(strip_angle_brackets);
    let in_reply_to = header_value(&pairs, "in-reply-to").and_then(strip_angle_brackets);
    let references = header_value(&pairs, "references")
        .map(split_references)
        .unwrap_or_default();

    MessageIds {
        message_id,
        in_reply_to,
        references,
    }
}

/// Flatten any header shape into `(lowercase_name, value)` pairs, in source order.
pub fn header_pairs(headers: Option<&EmailHeaders>) -> Vec<(String, String)> {
    let Some(headers) = headers else {
        return Vec::new();
    };

    match headers {
        EmailHeaders::Pairs(pairs) => pairs
            .iter()
            .map(|p| (p.name.trim().to_lowercase(), p.value.trim().to_string()))
            .filter(|(name, _)| !name.is_empty())
            .collect(),
        EmailHeaders::Raw { raw } | EmailHeaders::Text(raw) => unfold_headers(raw),
        EmailHeaders::Map(map) => map
            .iter()
            .filter_map(|(name, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s.trim().to_string(),
                    serde_json::Value::Array(items) => items
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(str::trim)
                        .collect::<Vec<_>>()
                        .join(", "),
                    serde_json::Value::Number(n) => n.to_string(),
                    _ => return None,
                };
                Some((name.trim().to_lowercase(), value))
            })
            .collect(),
    }
}

/// Get the first non-empty value for a lower-case header name.
pub fn header_value<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, v)| k == name && !v.is_empty())
        .map(|(_, v)| v.as_str())
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, value)` pairs. Parsing stops at the
/// first blank line, so a full message can be passed in.
pub fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    // Continuations of a rejected header line are dropped with it.
    let mut skipping = false;

    for line in text.lines() {
        if line.trim().is_empty() {
            if result.is_empty() {
                continue;
            }
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if skipping {
                continue;
            }
            if let Some(last) = result.last_mut() {
                if !last.1.is_empty() {
                    last.1.push(' ');
                }
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            skipping = name.is_empty() || name.contains(char::is_whitespace);
            if skipping {
                continue;
            }
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        } else {
            // Lines without a colon and not a continuation are silently skipped
            skipping = true;
        }
    }

    result
}

/// Strip surrounding whitespace and angle brackets. Idempotent.
///
/// Returns `None` when nothing is left.
pub fn strip_angle_brackets(value: &str) -> Option<String> {
    let stripped = value
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Split a `References` value on commas and whitespace.
///
/// Adjacent ids written without a separator (`<a@x><b@x>`) are split too.
fn split_references(value: &str) -> Vec<String> {
    value
        .replace("><", "> <")
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(strip_angle_brackets)
        .collect()
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Values without encoded words are returned unchanged. If `mail-parser`
/// cannot make sense of the value, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    if !input.contains("=?") {
        return input.to_string();
    }

    use mail_parser::MessageParser;

    // Wrap the value in a minimal message; Subject is an unstructured header
    let fake_msg = format!("Subject: {}\n\n", input.replace(['\r', '\n'], " "));
    MessageParser::default()
        .parse(fake_msg.as_bytes())
        .and_then(|msg| msg.subject().map(str::to_string))
        .unwrap_or_else(|| input.to_string())
}

/// Parse an address-list header (`From`, `To`, `Cc`, ...).
///
/// The list is split before display names are decoded: an encoded name may
/// decode to a comma (`=?UTF-8?Q?M=C3=BCller=2C_Hans?=`) and must not split
/// the address it belongs to. Empty entries are dropped.
pub fn parse_address_header(value: &str) -> Vec<EmailAddress> {
    EmailAddress::parse_list(value)
        .into_iter()
        .map(|mut address| {
            address.name = address
                .name
                .map(|name| decode_encoded_words(&name).trim().to_string())
                .filter(|name| !name.is_empty());
            address
        })
        .filter(|address| !address.is_empty())
        .collect()
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, the formats mail clients print in quote
/// attributions ("Mon, Jan 1, 2024 at 10:00 AM") and many broken real-world
/// variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let cleaned = date_str.replace(['\u{a0}', '\u{202f}'], " ");
    let trimmed = cleaned.trim().trim_end_matches([',', '.']).trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        // Quote attributions
        "%b %d, %Y at %I:%M %p",
        "%b %d, %Y, at %I:%M %p",
        "%b %d, %Y at %H:%M",
        "%b %d, %Y, at %H:%M",
        "%B %d, %Y at %I:%M %p",
        "%B %d, %Y %I:%M %p",
        "%B %d, %Y %H:%M",
        "%d %B %Y %H:%M",
        "%d %B %Y at %H:%M",
        "%d %b %Y at %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%d.%m.%Y %H:%M",
        "%m/%d/%Y %I:%M %p",
        "%m/%d/%Y %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&no_dow, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&no_dow, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    // Replace named timezones with offsets and try again
    let replaced = replace_named_tz(&no_dow);
    if replaced != no_dow {
        for fmt in &formats {
            let with_zone = format!("{fmt} %z");
            if let Ok(dt) = DateTime::parse_from_str(&replaced, &with_zone) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
        }
    }

    // Date-only attributions ("Jan 1, 2024") resolve to midnight UTC
    for fmt in ["%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y", "%Y-%m-%d", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&no_dow, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|ndt| Utc.from_utc_datetime(&ndt));
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

/// Attempt to parse a date using `mail-parser`'s built-in parser.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    use mail_parser::MessageParser;

    if !input.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Strip a leading day-of-week, abbreviated or full ("Thu, ", "Monday ").
fn strip_day_of_week(s: &str) -> String {
    let days = [
        "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "mon",
        "tue", "wed", "thu", "fri", "sat", "sun",
    ];
    for day in &days {
        let Some(rest) = s
            .get(..day.len())
            .filter(|head| head.eq_ignore_ascii_case(day))
            .and_then(|_| s.get(day.len()..))
        else {
            continue;
        };
        if let Some(rest) = rest.strip_prefix(',').or_else(|| rest.strip_prefix(' ')) {
            return rest.trim().to_string();
        }
    }
    s.to_string()
}

/// Replace a trailing well-known timezone abbreviation with a numeric offset.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(name) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::raw::HeaderPair;
    use std::collections::BTreeMap;

    fn map_headers(entries: &[(&str, &str)]) -> EmailHeaders {
        let map: BTreeMap<String, serde_json::Value> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        EmailHeaders::Map(map)
    }

    #[test]
    fn test_extract_from_all_shapes_is_identical() {
        let pairs = EmailHeaders::Pairs(vec![
            HeaderPair {
                name: "Message-ID".into(),
                value: "<m2@co.com>".into(),
            },
            HeaderPair {
                name: "In-Reply-To".into(),
                value: "<m1@co.com>".into(),
            },
            HeaderPair {
                name: "References".into(),
                value: "<m0@co.com> <m1@co.com>".into(),
            },
        ]);
        let raw = EmailHeaders::Raw {
            raw: "Message-Id: <m2@co.com>\r\nIn-Reply-To: <m1@co.com>\r\nReferences: <m0@co.com>\r\n <m1@co.com>\r\n"
                .into(),
        };
        let map = map_headers(&[
            ("message-id", "<m2@co.com>"),
            ("In-Reply-To", "<m1@co.com>"),
            ("References", "<m0@co.com>,<m1@co.com>"),
        ]);

        let expected = MessageIds {
            message_id: Some("m2@co.com".into()),
            in_reply_to: Some("m1@co.com".into()),
            references: vec!["m0@co.com".into(), "m1@co.com".into()],
        };
        assert_eq!(extract_message_ids(Some(&pairs)), expected);
        assert_eq!(extract_message_ids(Some(&raw)), expected);
        assert_eq!(extract_message_ids(Some(&map)), expected);
    }

    #[test]
    fn test_angle_bracket_stripping_is_idempotent() {
        let headers = map_headers(&[("message-id", "<abc@x>")]);
        let first = extract_message_ids(Some(&headers)).message_id.unwrap();
        assert_eq!(first, "abc@x");

        let rewrapped = map_headers(&[("message-id", &format!("<{first}>"))]);
        let second = extract_message_ids(Some(&rewrapped)).message_id.unwrap();
        assert_eq!(second, first);
        assert_eq!(strip_angle_brackets(&first).as_deref(), Some("abc@x"));
    }

    #[test]
    fn test_missing_headers_yield_absence() {
        assert_eq!(extract_message_ids(None), MessageIds::default());
        let garbage = EmailHeaders::Text("not a header block\n\n\n".into());
        assert_eq!(extract_message_ids(Some(&garbage)), MessageIds::default());
        let empty = map_headers(&[("Message-ID", "  <>  ")]);
        assert_eq!(extract_message_ids(Some(&empty)).message_id, None);
    }

    #[test]
    fn test_references_without_separators() {
        let headers = map_headers(&[("References", "<a@x><b@x>,, <c@x>")]);
        let ids = extract_message_ids(Some(&headers));
        assert_eq!(ids.references, vec!["a@x", "b@x", "c@x"]);
    }

    #[test]
    fn test_map_array_values_are_joined() {
        let mut map = BTreeMap::new();
        map.insert(
            "References".to_string(),
            serde_json::json!(["<a@x>", "<b@x>"]),
        );
        let ids = extract_message_ids(Some(&EmailHeaders::Map(map)));
        assert_eq!(ids.references, vec!["a@x", "b@x"]);
    }

    #[test]
    fn test_unfold_drops_continuations_of_rejected_lines() {
        let text = "Subject: Hello\nX Bad Header: value\n continued\nTo: a@b.com\n";
        let headers = unfold_headers(text);
        assert_eq!(
            headers,
            vec![
                ("subject".to_string(), "Hello".to_string()),
                ("to".to_string(), "a@b.com".to_string()),
            ]
        );
    }

    #[test]
    fn test_encoded_name_with_comma_keeps_address() {
        let list = parse_address_header(
            "=?UTF-8?Q?M=C3=BCller=2C_Hans?= <Hans@co.com>, \"Doe, Jane\" <jane@co.com>",
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name.as_deref(), Some("Müller, Hans"));
        assert_eq!(list[0].email.as_deref(), Some("hans@co.com"));
        assert_eq!(list[1].name.as_deref(), Some("Doe, Jane"));
        assert!(parse_address_header(" , ").is_empty());
    }

    #[test]
    fn test_unfold_headers() {
        let text = "Subject: This is a long\n\tsubject line\nFrom: user@example.com\n\nBody: not a header\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "subject");
        assert_eq!(headers[0].1, "This is a long subject line");
    }

    #[test]
    fn test_header_value_is_first_non_empty() {
        let pairs = vec![
            ("to".to_string(), String::new()),
            ("to".to_string(), "a@b.com".to_string()),
        ];
        assert_eq!(header_value(&pairs, "to"), Some("a@b.com"));
        assert_eq!(header_value(&pairs, "cc"), None);
    }

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_plain_passthrough() {
        assert_eq!(decode_encoded_words("Re: Normal subject"), "Re: Normal subject");
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
    }

    #[test]
    fn test_parse_date_named_tz() {
        let dt = parse_date("04 Jan 2024 10:00:00 EST").unwrap();
        assert_eq!(dt.format("%H").to_string(), "15");
    }

    #[test]
    fn test_parse_date_iso8601() {
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
    }

    #[test]
    fn test_parse_date_gmail_attribution() {
        let dt = parse_date("Mon, Jan 1, 2024 at 10:30 AM").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-01 10:30");
    }

    #[test]
    fn test_parse_date_outlook_sent_line() {
        let dt = parse_date("Monday, January 1, 2024 2:15 PM").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-01 14:15");
    }

    #[test]
    fn test_parse_date_without_time() {
        let dt = parse_date("Mon, Jan 1, 2024").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-01 00:00");
    }

    #[test]
    fn test_parse_date_non_ascii_day_token() {
        // Lower-casing 'İ' changes its byte length.
        assert_eq!(strip_day_of_week("Fr\u{130}day, 1 Jan 2024"), "Fr\u{130}day, 1 Jan 2024");
        let _ = parse_date("Fr\u{130}day, 1 Jan 2024 10:00");
        let dt = parse_date("FRIDAY, 5 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-05 10:00");
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("").is_none());
        assert!(parse_date("sometime last week").is_none());
    }
}
