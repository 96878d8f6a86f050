//! Email address parsing (RFC 5322 §3.4), tolerant of real-world headers.

use serde::{Deserialize, Serialize};

/// A parsed email address. Both parts are optional: SMS senders may only
/// carry a phone number, and broken headers may only carry a name.
///
/// # Examples
/// - `"Jane Doe <Jane@Co.com>"` → `name = Some("Jane Doe")`, `email = Some("jane@co.com")`
/// - `"user@example.com"` → `name = None`, `email = Some("user@example.com")`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name, quotes stripped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The bare address, trimmed and lower-cased.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl EmailAddress {
    /// Parse a single address token.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    ///
    /// A token without `@` and without angle brackets is kept as a name.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    let addr = trimmed[angle_start + 1..angle_end].trim();
                    let name = strip_quotes(&trimmed[..angle_start]);
                    return Self {
                        name: non_empty(name),
                        email: non_empty(addr.to_lowercase()),
                    };
                }
            }
        }

        if trimmed.contains('@') && !trimmed.contains(char::is_whitespace) {
            return Self {
                name: None,
                email: Some(trimmed.trim_matches('"').to_lowercase()),
            };
        }

        Self {
            name: non_empty(strip_quotes(trimmed)),
            email: None,
        }
    }

    /// Parse a comma-separated list of addresses.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`.
    /// Empty tokens are dropped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' | ';' if !in_quotes && !in_angle => {
                    let addr = Self::parse(&current);
                    if !addr.is_empty() {
                        results.push(addr);
                    }
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        let addr = Self::parse(&current);
        if !addr.is_empty() {
            results.push(addr);
        }

        results
    }

    /// `true` when neither a name nor an email was recovered.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    /// Domain part of the email, if any.
    pub fn domain(&self) -> Option<&str> {
        self.email
            .as_deref()
            .and_then(|e| e.rsplit_once('@'))
            .map(|(_, domain)| domain)
            .filter(|d| !d.is_empty())
    }

    /// Format for display: `"Name <email>"`, or whichever part exists.
    pub fn display(&self) -> String {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) => format!("{name} <{email}>"),
            (Some(name), None) => name.clone(),
            (None, Some(email)) => email.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

fn non_empty(s: impl Into<String>) -> Option<String> {
    let s = s.into();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
