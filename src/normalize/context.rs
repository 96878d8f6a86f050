//! Classification context: who counts as an agent.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One value or a list of values.
///
/// Organizations configured before multi-domain support store a single
/// `org_domain` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }

    pub fn extend(&mut self, more: impl IntoIterator<Item = String>) {
        let mut values = std::mem::take(self).into_vec();
        values.extend(more);
        *self = Self::Many(values);
    }
}

/// Caller-supplied classification input, as read from organization and
/// user-directory lookups (or the `[classification]` config section).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextInput {
    pub agent_emails: Vec<String>,
    pub agent_phones: Vec<String>,
    #[serde(alias = "org_domain")]
    pub org_domains: OneOrMany,
    pub current_user_email: Option<String>,
}

/// Pre-normalized lookup sets used by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationContext {
    /// Lower-cased agent addresses.
    pub agent_email_set: HashSet<String>,
    /// Agent phone numbers reduced to digits (leading `+` kept).
    pub agent_phone_set: HashSet<String>,
    /// Lower-cased domains without a leading `@`.
    pub org_domains: Vec<String>,
    pub current_user_email: Option<String>,
}

impl NormalizationContext {
    /// `true` if `email` is a known agent address or in an org domain.
    pub fn is_agent_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return false;
        }
        self.agent_email_set.contains(&email) || in_org_domains(&email, &self.org_domains)
    }

    pub fn is_agent_phone(&self, phone: &str) -> bool {
        let phone = normalize_phone(phone);
        !phone.is_empty() && self.agent_phone_set.contains(&phone)
    }

    pub fn is_current_user(&self, email: &str) -> bool {
        self.current_user_email
            .as_deref()
            .is_some_and(|me| me == email.trim().to_lowercase())
    }
}

/// Build the lookup context, normalizing every entry.
pub fn create_normalization_context(input: ContextInput) -> NormalizationContext {
    let agent_email_set = input
        .agent_emails
        .iter()
        .filter_map(|e| normalize_email(e))
        .collect();
    let agent_phone_set = input
        .agent_phones
        .iter()
        .map(|p| normalize_phone(p))
        .filter(|p| !p.is_empty())
        .collect();

    let mut org_domains: Vec<String> = Vec::new();
    for domain in input.org_domains.into_vec() {
        let domain = domain.trim().trim_start_matches('@').to_lowercase();
        if !domain.is_empty() && !org_domains.contains(&domain) {
            org_domains.push(domain);
        }
    }

    NormalizationContext {
        agent_email_set,
        agent_phone_set,
        org_domains,
        current_user_email: input.current_user_email.as_deref().and_then(normalize_email),
    }
}

fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    (!email.is_empty()).then_some(email)
}

/// Digits only; a leading `+` survives.
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return digits;
    }
    if trimmed.starts_with('+') {
        format!("+{digits}")
    } else {
        digits
    }
}

/// `true` for something that reads like a phone number rather than a name.
pub fn looks_like_phone(value: &str) -> bool {
    let trimmed = value.trim();
    let digits = trimmed.chars().filter(char::is_ascii_digit).count();
    digits >= 5
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'))
}

/// Domain of `email` matches one of `domains` exactly.
pub fn in_org_domains(email: &str, domains: &[String]) -> bool {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domains.iter().any(|d| d == domain))
        .unwrap_or(false)
}
